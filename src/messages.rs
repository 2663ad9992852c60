use chrono::{DateTime, FixedOffset, Weekday};
use chrono_tz::Tz;

use crate::attendance::{Session, WeeklySummary, WorkStatus};
use crate::error::AttendanceError;

pub const BUTTON_CLOCK_IN: &str = "✅ Fichar entrada";
pub const BUTTON_CLOCK_OUT: &str = "❌ Fichar salida";
pub const BUTTON_STATUS: &str = "ℹ️ Estado actual";
pub const BUTTON_SUMMARY: &str = "📊 Resumen semanal";

/// `"{h}h {m}m"`, truncating; negative durations render as `"0s"`.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 {
        return "0s".to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{}h {}m", whole / 3600, (whole % 3600) / 60)
}

fn clock_time(instant: DateTime<FixedOffset>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M:%S").to_string()
}

fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miércoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

pub fn welcome(first_name: &str) -> String {
    format!("¡Hola, {}! 👋\n\nUsa los botones para gestionar tu jornada.", escape(first_name))
}

pub fn deep_link_clock_in() -> &'static str {
    "🚀 Recibido acceso directo. Fichando entrada..."
}

pub fn clocked_in(entry: DateTime<FixedOffset>, tz: Tz) -> String {
    format!("✅ ¡Entrada registrada a las <b>{}</b>!", clock_time(entry, tz))
}

pub fn clocked_out(session: &Session, tz: Tz) -> String {
    format!(
        "❌ Salida registrada a las <b>{}</b>.\n\n⏱️ Tiempo trabajado hoy: <b>{}</b>.",
        clock_time(session.exit_time, tz),
        format_duration(session.duration_secs)
    )
}

pub fn auto_clock_out() -> &'static str {
    "🔔 <b>¡Han pasado 8 horas! He registrado tu salida automáticamente.</b>"
}

pub fn status(status: &WorkStatus, tz: Tz) -> String {
    match status {
        WorkStatus::Idle => "😴 No estás trabajando ahora mismo.".to_string(),
        WorkStatus::Working {
            entry_time,
            elapsed_secs,
            remaining_secs,
        } => format!(
            "💼 <b>Estado de la jornada:</b>\n\n\
             ▶️ <b>Inicio:</b> {}\n\
             ⏳ <b>Llevas:</b> {}\n\
             🏁 <b>Te quedan:</b> {}",
            clock_time(*entry_time, tz),
            format_duration(*elapsed_secs),
            format_duration(*remaining_secs)
        ),
    }
}

pub fn weekly_summary(summary: &WeeklySummary) -> String {
    let mut text = String::from("📊 <b>Resumen de horas de la semana:</b>\n\n");
    for day in &summary.days {
        text.push_str(&format!(
            "• <b>{}</b>: {}\n",
            weekday_label(day.weekday),
            format_duration(day.seconds)
        ));
    }
    text.push_str(&format!(
        "\n<b>Total semanal: {}</b>",
        format_duration(summary.total_secs)
    ));
    text
}

pub fn rejected(err: AttendanceError) -> &'static str {
    match err {
        AttendanceError::AlreadyWorking => "🔴 Ya has fichado la entrada.",
        AttendanceError::NotWorking => "🤔 No has fichado la entrada todavía.",
        AttendanceError::NoRecords => "Aún no tienes registros guardados.",
    }
}

pub fn storage_failed() -> &'static str {
    "⚠️ No he podido guardar el registro. Inténtalo de nuevo en unos minutos."
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

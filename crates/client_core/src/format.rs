//! Display helpers for listing rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use shared::protocol::{SortDirection, SortSpec};

/// Numero as shown in tables: at least two digits.
pub fn format_numero(numero: i64) -> String {
    format!("{numero:02}")
}

pub fn status_label(utilizado: bool) -> &'static str {
    if utilizado {
        "Utilizado"
    } else {
        "Não Utilizado"
    }
}

pub fn format_boolean(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Sim",
        Some(false) => "Não",
        None => "",
    }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive ISO timestamps.
pub fn parse_data_envio(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|timestamp| timestamp.date())
}

/// Brazilian `dd/mm/yyyy`. Unparseable input is shown as stored.
pub fn format_date(raw: Option<&str>) -> String {
    match raw {
        None => String::new(),
        Some(raw) if raw.trim().is_empty() => String::new(),
        Some(raw) => parse_data_envio(raw)
            .map(|date| date.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| raw.to_string()),
    }
}

pub fn sort_label(sort: SortSpec) -> String {
    let direction = match sort.direction {
        SortDirection::Asc => "(A-Z)",
        SortDirection::Desc => "(Z-A)",
    };
    format!("{} {direction}", sort.field.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::SortField;

    #[test]
    fn numero_is_zero_padded_to_two_digits() {
        assert_eq!(format_numero(3), "03");
        assert_eq!(format_numero(42), "42");
        assert_eq!(format_numero(120), "120");
    }

    #[test]
    fn dates_render_day_first() {
        assert_eq!(format_date(Some("2024-03-09")), "09/03/2024");
        assert_eq!(format_date(Some("2024-03-09T14:00:00+00:00")), "09/03/2024");
        assert_eq!(format_date(Some("2024-03-09T14:00:00.123")), "09/03/2024");
        assert_eq!(format_date(Some("ontem")), "ontem");
        assert_eq!(format_date(None), "");
    }

    #[test]
    fn labels() {
        assert_eq!(status_label(true), "Utilizado");
        assert_eq!(status_label(false), "Não Utilizado");
        assert_eq!(format_boolean(Some(false)), "Não");
        assert_eq!(format_boolean(None), "");
        assert_eq!(
            sort_label(SortSpec::new(SortField::Remetente, SortDirection::Asc)),
            "Ordenar por Remetente (A-Z)"
        );
    }
}

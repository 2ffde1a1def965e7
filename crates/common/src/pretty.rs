use tabled::{Table, Tabled, builder::Builder, settings};

/// Predefined output styles that map to `tabled` styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TableStyleKind {
    #[default]
    Modern,
    Ascii,
    Plain,
}

impl TableStyleKind {
    fn apply(self, table: &mut Table) {
        match self {
            Self::Modern => table.with(settings::Style::modern()),
            Self::Ascii => table.with(settings::Style::ascii()),
            Self::Plain => table.with(settings::Style::empty()),
        };
    }
}

/// Render arbitrary string rows with the provided style.
pub fn render_string_table(
    headers: &[&str],
    rows: Vec<Vec<String>>,
    style: TableStyleKind,
) -> String {
    if headers.is_empty() && rows.is_empty() {
        return "<empty>".into();
    }

    let mut builder = Builder::default();

    if !headers.is_empty() {
        builder.push_record(headers.iter().copied());
    }

    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    style.apply(&mut table);
    table.to_string()
}

/// Render any `Tabled` rows with the provided style.
pub fn render_structured_rows<T>(rows: &[T], style: TableStyleKind) -> String
where
    T: Tabled + Clone,
{
    if rows.is_empty() {
        return "<empty>".into();
    }

    let mut table = Table::new(rows.to_vec());
    style.apply(&mut table);
    table.to_string()
}

/// Format record bytes for display, lossily decoded and cut at `max_chars`.
pub fn format_record_preview(bytes: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        preview.push('…');
    }
    format!("'{preview}'")
}

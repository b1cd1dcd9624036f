use anyhow::Result;
use std::io::Write;

use crate::domain::{Statement, format_cents};

/// Writes a built statement in machine-readable formats.
pub struct StatementExporter<'a> {
    statement: &'a Statement,
}

impl<'a> StatementExporter<'a> {
    pub fn new(statement: &'a Statement) -> Self {
        Self { statement }
    }

    /// One row per consumption record, followed by a summary block keyed in
    /// the `date` column. Returns the number of record rows written.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record([
            "date",
            "meal_slot",
            "main_meal",
            "premium",
            "dish_name",
            "extra_rice",
            "extra_bread",
            "total_cost",
        ])?;

        let mut count = 0;
        for record in &self.statement.records {
            let selection = &record.selection;
            csv_writer.write_record([
                record.service_date.to_string(),
                record.meal_slot.to_string(),
                selection.has_main_meal.to_string(),
                selection.is_premium.to_string(),
                selection.dish_name.clone().unwrap_or_default(),
                selection.extra_rice.to_string(),
                selection.extra_bread.to_string(),
                format_cents(record.total_cost),
            ])?;
            count += 1;
        }

        let s = self.statement;
        for (label, amount) in [
            ("opening_balance", s.opening_balance),
            ("total_recharges", s.total_recharges),
            ("total_spent", s.total_spent),
            ("closing_balance", s.closing_balance),
        ] {
            let amount = format_cents(amount);
            csv_writer.write_record([label, "", "", "", "", "", "", amount.as_str()])?;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// The whole statement as pretty-printed JSON. Amounts stay in cents.
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        let json = serde_json::to_string_pretty(self.statement)?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

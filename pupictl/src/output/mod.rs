//! Rendering of pupi and vote totals for the terminal or for other tools
use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::Serialize;
use table::PupictlTable;
use tabled::{Table, Tabled, builder::Builder};

pub(crate) mod rows;
pub(crate) mod table;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub(crate) enum OutputFormat {
    /// Human readable table
    Table,
    /// Comma-separated values for importing into a spreadsheet
    Csv,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

fn serialize<T: Serialize + ?Sized>(value: &T, fmt: OutputFormat) -> Result<String> {
    Ok(match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Table | OutputFormat::Csv => bail!("{fmt:?} is not a serialization format"),
    })
}

/// Render a single record. Tables list one field per line.
pub(crate) fn format_one<T>(item: T, fmt: OutputFormat) -> Result<String>
where
    T: Tabled + Serialize,
{
    match fmt {
        OutputFormat::Table => {
            let mut builder = Builder::default();
            for (field, value) in T::headers().into_iter().zip(item.fields()) {
                builder.push_record([field.into_owned(), value.into_owned()]);
            }
            Ok(builder.build().styled().to_string())
        }
        OutputFormat::Csv => bail!("CSV output is only available for lists"),
        _ => serialize(&item, fmt),
    }
}

/// Render a list of records, with a record count after tables
pub(crate) fn format_seq<I>(items: I, fmt: OutputFormat) -> Result<String>
where
    I: IntoIterator,
    I::Item: Tabled + Serialize,
{
    let items: Vec<_> = items.into_iter().collect();
    match fmt {
        OutputFormat::Table => {
            let n = items.len();
            Ok(format!("{}\n{n} records found", Table::new(items).styled()))
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(vec![]);
            for item in &items {
                writer.serialize(item)?;
            }
            Ok(String::from_utf8(writer.into_inner()?)?)
        }
        _ => serialize(&items, fmt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Tabled, Serialize)]
    struct Row {
        id: i64,
        name: &'static str,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                id: 1,
                name: "Il Pupo del Porto",
            },
            Row {
                id: 2,
                name: "Pupo Politico",
            },
        ]
    }

    #[test]
    fn test_format_seq() {
        assert_eq!(
            format_seq(rows(), OutputFormat::Csv).unwrap(),
            "id,name\n1,Il Pupo del Porto\n2,Pupo Politico\n"
        );
        let json: serde_json::Value =
            serde_json::from_str(&format_seq(rows(), OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(
            json,
            json!([{"id": 1, "name": "Il Pupo del Porto"}, {"id": 2, "name": "Pupo Politico"}])
        );

        let table = format_seq(rows(), OutputFormat::Table).unwrap();
        assert!(table.contains("Pupo Politico"));
        assert!(table.ends_with("2 records found"));

        let empty = format_seq(Vec::<Row>::new(), OutputFormat::Table).unwrap();
        assert!(empty.ends_with("0 records found"));
    }

    #[test]
    fn test_format_one() {
        let mut rows = rows();
        assert!(format_one(rows.remove(0), OutputFormat::Csv).is_err());

        let row = rows.remove(0);
        let table = format_one(row, OutputFormat::Table).unwrap();
        let lines: Vec<_> = table.lines().filter(|l| l.contains("name")).collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Pupo Politico"));

        let yaml = format_one(
            Row {
                id: 2,
                name: "Pupo Politico",
            },
            OutputFormat::Yaml,
        )
        .unwrap();
        assert_eq!(yaml, "id: 2\nname: Pupo Politico\n");
    }
}

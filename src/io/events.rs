//! Event table loader.
//!
//! Expected columns: `Start Date`, `Event Name`, `Description` (case-insensitive).
//! Rows are kept in file order; that order breaks ties when matching the
//! change date to its nearest event.

use std::fs::File;
use std::path::Path;

use tracing::info;

use crate::domain::{Event, EventTable};
use crate::error::AppError;
use crate::io::ingest::{build_header_map, parse_date, require_column};

pub fn load_event_table(path: &Path) -> Result<EventTable, AppError> {
    if !path.exists() {
        return Err(AppError::NotFound {
            what: "Event file",
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let header_map = build_header_map(&reader.headers()?.clone());
    let date_idx = require_column(&header_map, "start date", "Start Date", path)?;
    let name_idx = require_column(&header_map, "event name", "Event Name", path)?;
    let desc_idx = require_column(&header_map, "description", "Description", path)?;

    let mut events = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result?;
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();

        let raw_date = field(date_idx);
        if raw_date.is_empty() {
            return Err(AppError::Parse(format!("Missing `Start Date` on line {line}.")));
        }
        let start_date = parse_date(&raw_date).map_err(|msg| AppError::Parse(format!("{msg} (line {line})")))?;

        events.push(Event {
            start_date,
            name: field(name_idx),
            description: field(desc_idx),
        });
    }

    info!(path = %path.display(), events = events.len(), "loaded event table");
    Ok(EventTable { events })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("bcp-events-{}-{name}", std::process::id()))
    }

    #[test]
    fn loads_quoted_rows_in_file_order() {
        let path = tmp_path("events.csv");
        std::fs::write(
            &path,
            "Start Date,Event Name,Description\n\
             2020-03-06,OPEC+ talks collapse,\"Saudi Arabia, Russia fail to agree\"\n\
             24-Feb-22,Invasion of Ukraine,Sanctions fears\n",
        )
        .unwrap();
        let table = load_event_table(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(table.events.len(), 2);
        assert_eq!(table.events[0].name, "OPEC+ talks collapse");
        assert_eq!(table.events[0].description, "Saudi Arabia, Russia fail to agree");
        assert_eq!(table.events[1].start_date, NaiveDate::from_ymd_opt(2022, 2, 24).unwrap());
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let path = tmp_path("bad.csv");
        std::fs::write(&path, "Start Date,Event Name\n2020-03-06,X\n").unwrap();
        assert!(matches!(load_event_table(&path), Err(AppError::Schema(_))));

        std::fs::write(&path, "Start Date,Event Name,Description\nsoon,X,Y\n").unwrap();
        assert!(matches!(load_event_table(&path), Err(AppError::Parse(_))));
        std::fs::remove_file(&path).ok();

        assert!(matches!(
            load_event_table(&tmp_path("absent.csv")),
            Err(AppError::NotFound { .. })
        ));
    }
}

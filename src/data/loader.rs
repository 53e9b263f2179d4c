use crate::error::Result;
use crate::models::{Priority, Ticket};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// One corpus row as written; every cell may be blank
#[derive(Debug, Deserialize)]
struct RawTicket {
    #[serde(default)]
    ticket_id: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl RawTicket {
    fn into_ticket(self, row: usize) -> Option<Ticket> {
        let category = self.category.filter(|c| !c.trim().is_empty())?;

        let priority = match self.priority.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => match Priority::from_str(p) {
                Ok(priority) => Some(priority),
                Err(_) => {
                    debug!(row, priority = p, "Unrecognised priority");
                    None
                }
            },
            _ => None,
        };

        Some(Ticket {
            ticket_id: self
                .ticket_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("row-{row}")),
            subject: self.subject.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            category: category.trim().to_string(),
            priority,
            timestamp: self.timestamp.unwrap_or_default(),
        })
    }
}

/// Load the ticket corpus from a CSV file
pub fn load_tickets(path: impl AsRef<Path>) -> Result<Vec<Ticket>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let tickets = read_tickets(BufReader::new(file))?;

    info!(
        path = %path.display(),
        tickets = tickets.len(),
        "📂 Ticket corpus loaded"
    );
    Ok(tickets)
}

/// Parse tickets from any CSV reader. Rows without a category are skipped.
pub fn read_tickets<R: Read>(reader: R) -> Result<Vec<Ticket>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut tickets = Vec::new();
    let mut skipped = 0usize;

    for (idx, result) in rdr.deserialize::<RawTicket>().enumerate() {
        // header is line 1
        let row = idx + 2;
        let raw = result?;
        match raw.into_ticket(row) {
            Some(ticket) => tickets.push(ticket),
            None => {
                skipped += 1;
                warn!(row, "Skipping ticket without a category");
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = tickets.len(), "Rows dropped while loading corpus");
    }
    Ok(tickets)
}

/// Write tickets back out in the corpus column layout
pub fn write_tickets(path: impl AsRef<Path>, tickets: &[Ticket]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["ticket_id", "subject", "description", "category", "priority", "timestamp"])?;
    for ticket in tickets {
        let priority = ticket.priority.map(|p| p.to_string()).unwrap_or_default();
        wtr.write_record([
            ticket.ticket_id.as_str(),
            ticket.subject.as_str(),
            ticket.description.as_str(),
            ticket.category.as_str(),
            priority.as_str(),
            ticket.timestamp.as_str(),
        ])?;
    }
    wtr.flush()?;

    info!(path = %path.display(), tickets = tickets.len(), "Tickets written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = "\
ticket_id,subject,description,category,priority,timestamp
T1,Login broken,Cannot sign in since update,Bug Report,High,2024-01-02T10:00:00
T2,,Please add dark mode,Feature Request,Low,2024-01-03T11:00:00
T3,Charged twice,,Billing Inquiry,Urgent-ish,2024-01-04T12:00:00
T4,No category here,Lost row,,Medium,2024-01-05T13:00:00
";

    #[test]
    fn test_read_tickets_fills_blanks_and_skips_uncategorised() {
        let tickets = read_tickets(CORPUS.as_bytes()).unwrap();
        assert_eq!(tickets.len(), 3);

        assert_eq!(tickets[0].priority, Some(Priority::High));
        assert_eq!(tickets[1].subject, "");
        assert_eq!(tickets[1].category, "Feature Request");
        assert_eq!(tickets[2].description, "");
        assert_eq!(tickets[2].priority, None);
        assert_eq!(tickets[2].timestamp, "2024-01-04T12:00:00");
    }

    #[test]
    fn test_headers_only_subset() {
        let csv = " subject , category \nPrinter jam,Technical Issue\n";
        let tickets = read_tickets(csv.as_bytes()).unwrap();

        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].ticket_id, "row-2");
        assert_eq!(tickets[0].description, "");
        assert_eq!(tickets[0].text(), "printer jam ");
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed/train.csv");

        let tickets = read_tickets(CORPUS.as_bytes()).unwrap();
        write_tickets(&path, &tickets).unwrap();

        assert_eq!(load_tickets(&path).unwrap(), tickets);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_tickets("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, crate::error::AppError::Io(_)));
    }
}

//! Row-oriented text ingestion.
//!
//! One record per line: `identifier,value_1,...,value_D`. Fields beyond
//! the `D`-th value are ignored.
use crate::data::{GroupTable, Observation};
use crate::error::Result;
use crate::traits::ComponentFamily;
use std::io::Read;
use tracing::{info, trace, warn};

/// Tally of what happened to each record read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records added to a group
    pub n_added: usize,
    /// Records outside the support of the family (e.g. negative counts)
    pub n_rejected: usize,
    /// Records with missing or unparseable fields
    pub n_malformed: usize,
    /// Valid records whose group does not exist while `force_add` is off
    pub n_dropped: usize,
}

impl IngestReport {
    /// Total number of records seen
    pub fn n_records(&self) -> usize {
        self.n_added + self.n_rejected + self.n_malformed + self.n_dropped
    }
}

enum Parsed<X> {
    Valid(String, Vec<X>),
    Rejected,
    Malformed,
}

fn parse_record<Fx: ComponentFamily>(
    record: &csv::StringRecord,
    family: &Fx,
    dim: usize,
) -> Parsed<Fx::Datum> {
    let id = match record.get(0) {
        Some(id) if !id.is_empty() => id,
        _ => return Parsed::Malformed,
    };
    if record.len() < dim + 1 {
        return Parsed::Malformed;
    }
    let x: Option<Vec<Fx::Datum>> =
        (1..=dim).map(|ix| record[ix].parse().ok()).collect();
    match x {
        Some(x) if family.supports(&x) => Parsed::Valid(id.to_owned(), x),
        Some(_) => Parsed::Rejected,
        None => Parsed::Malformed,
    }
}

/// Read every record from `reader` into `table`.
///
/// Valid records are appended to the group with their identifier. A group
/// absent from `table` is created only when `force_add` is set, otherwise
/// the record is dropped. Invalid records are skipped; only failures of
/// the underlying reader are returned as errors.
pub fn read_records<R, Fx>(
    reader: R,
    family: &Fx,
    dim: usize,
    k: usize,
    table: &mut GroupTable<Fx::Datum>,
    force_add: bool,
) -> Result<IngestReport>
where
    R: Read,
    Fx: ComponentFamily,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut report = IngestReport::default();
    let mut record = csv::StringRecord::new();
    while csv_reader.read_record(&mut record)? {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        match parse_record(&record, family, dim) {
            Parsed::Valid(id, x) => {
                match table.find_or_insert(&id, k, force_add) {
                    Some(group) => {
                        group.add_observation(Observation::new(x, k));
                        report.n_added += 1;
                    }
                    None => report.n_dropped += 1,
                }
            }
            Parsed::Rejected => {
                trace!(line, "record outside support");
                report.n_rejected += 1;
            }
            Parsed::Malformed => {
                trace!(line, "malformed record");
                report.n_malformed += 1;
            }
        }
    }

    if report.n_rejected + report.n_malformed > 0 {
        warn!(
            n_rejected = report.n_rejected,
            n_malformed = report.n_malformed,
            "skipped invalid records"
        );
    }
    info!(n_added = report.n_added, "added records");
    Ok(report)
}

/// Read every record from `reader` into a fresh table, creating groups as
/// they are first seen.
pub fn read_groups<R, Fx>(
    reader: R,
    family: &Fx,
    dim: usize,
    k: usize,
) -> Result<(GroupTable<Fx::Datum>, IngestReport)>
where
    R: Read,
    Fx: ComponentFamily,
{
    let mut table = GroupTable::new();
    let report = read_records(reader, family, dim, k, &mut table, true)?;
    Ok((table, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::PoissonFamily;
    use indoc::indoc;

    #[test]
    fn records_accumulate_by_identifier() {
        let text = indoc! {"
            a,1,2
            b,3,4
            a,5,6
        "};
        let (table, report) =
            read_groups(text.as_bytes(), &PoissonFamily, 2, 2).unwrap();
        assert_eq!(report.n_added, 3);
        assert_eq!(table.len(), 2);
        let a = table.get("a").unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.observations()[1].x(), &[5, 6]);
        assert_eq!(a.observations()[1].gamma(), &[0.5, 0.5]);
    }

    #[test]
    fn negative_value_is_rejected_without_creating_group() {
        let text = indoc! {"
            a,1
            b,-2
            a,-1
        "};
        let (table, report) =
            read_groups(text.as_bytes(), &PoissonFamily, 1, 2).unwrap();
        assert_eq!(report.n_rejected, 2);
        assert_eq!(table.len(), 1);
        assert!(table.get("b").is_none());
        assert_eq!(table.get("a").unwrap().len(), 1);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let text = indoc! {"
            a,1,2
            a,1
            a,x,2
            ,1,2
            b,7,8,9
        "};
        let (table, report) =
            read_groups(text.as_bytes(), &PoissonFamily, 2, 1).unwrap();
        assert_eq!(report.n_malformed, 3);
        assert_eq!(report.n_added, 2);
        assert_eq!(report.n_records(), 5);
        assert_eq!(table.get("b").unwrap().observations()[0].x(), &[7, 8]);
    }

    #[test]
    fn without_force_add_only_known_groups_grow() {
        let mut table = GroupTable::new();
        table.find_or_insert("known", 1, true);
        let text = "known,4\nunknown,5\n";
        let report = read_records(
            text.as_bytes(),
            &PoissonFamily,
            1,
            1,
            &mut table,
            false,
        )
        .unwrap();
        assert_eq!(report.n_added, 1);
        assert_eq!(report.n_dropped, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("known").unwrap().len(), 1);
    }

    #[test]
    fn whitespace_around_fields_is_ignored() {
        let text = " a , 3 \n";
        let (table, _) =
            read_groups(text.as_bytes(), &PoissonFamily, 1, 1).unwrap();
        assert_eq!(table.get("a").unwrap().observations()[0].x(), &[3]);
    }
}

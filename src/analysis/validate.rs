// src/analysis/validate.rs

//! Post-classification checks applied before records reach the sink.

use crate::models::{ErrorTag, Record};

/// Tag exceptional records. Records keep flowing to the sink either way.
///
/// A tag set earlier (such as the low-confidence marker) is never replaced.
pub fn tag_exceptions(mut record: Record) -> Record {
    if record.error.is_some() {
        return record;
    }
    if record.regions.is_empty() {
        record.tag(ErrorTag::NoRegion);
    } else if record.text.trim().is_empty() {
        record.tag(ErrorTag::EmptyText);
    } else if record.regions.len() > 1 && record.errand_type {
        record.tag(ErrorTag::AmbiguousRegions);
    }
    record
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::models::Classification;

    fn classified(text: &str, regions: &[&str], errand_type: bool) -> Record {
        Record::new(1, text, DateTime::from_timestamp(0, 0).unwrap()).classified(Classification {
            regions: regions.iter().map(|r| r.to_string()).collect(),
            errand_type,
            error: None,
        })
    }

    #[test]
    fn test_clean_record_untouched() {
        let record = tag_exceptions(classified("text", &["Northland"], true));
        assert_eq!(record.error, None);

        let record = tag_exceptions(classified("text", &["Northland", "Southland"], false));
        assert_eq!(record.error, None);
    }

    #[test]
    fn test_no_region() {
        let record = tag_exceptions(classified("text", &[], false));
        assert_eq!(record.error, Some(ErrorTag::NoRegion));
    }

    #[test]
    fn test_empty_text() {
        let record = tag_exceptions(classified("   ", &["Northland"], false));
        assert_eq!(record.error, Some(ErrorTag::EmptyText));
    }

    #[test]
    fn test_multiple_regions_with_special_type() {
        let record = tag_exceptions(classified("text", &["Northland", "Southland"], true));
        assert_eq!(record.error, Some(ErrorTag::AmbiguousRegions));
    }

    #[test]
    fn test_existing_tag_wins() {
        let mut record = classified("text", &[], false);
        record.tag(ErrorTag::MaybeErrand);

        let record = tag_exceptions(record);
        assert_eq!(record.error, Some(ErrorTag::MaybeErrand));
    }
}

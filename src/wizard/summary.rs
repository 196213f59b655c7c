use utoipa::ToSchema;

use super::picker::Picker;
use super::roster::Roster;
use crate::currency::{format_currency_br, parse_currency_br};
use crate::data::class::Class;
use crate::data::report::{ClassRef, NewAttendanceReport};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryField {
    BibleCount,
    MagazineCount,
    VisitorCount,
    OfferingAmount,
}

/// Summary inputs exactly as typed. Coercion happens on submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryFields {
    pub bible_count: String,
    pub magazine_count: String,
    pub visitor_count: String,
    /// Kept in `1.234,56` form.
    pub offering_amount: String,
}

impl SummaryFields {
    pub fn set(&mut self, field: SummaryField, value: &str) {
        match field {
            SummaryField::BibleCount => self.bible_count = value.to_string(),
            SummaryField::MagazineCount => self.magazine_count = value.to_string(),
            SummaryField::VisitorCount => self.visitor_count = value.to_string(),
            SummaryField::OfferingAmount => self.offering_amount = format_currency_br(value),
        }
    }

    pub fn bibles(&self) -> u32 {
        coerce_count(&self.bible_count)
    }

    pub fn magazines(&self) -> u32 {
        coerce_count(&self.magazine_count)
    }

    pub fn visitors(&self) -> u32 {
        coerce_count(&self.visitor_count)
    }

    pub fn offer_amount(&self) -> f64 {
        parse_currency_br(&self.offering_amount)
    }
}

/// Lenient count parsing: anything that isn't a positive finite number
/// counts as zero, fractions are truncated.
pub fn coerce_count(raw: &str) -> u32 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value.trunc().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

/// Roster snapshot and typed summary of one class, ready to be submitted.
#[derive(Debug, Clone)]
pub struct SummaryStage {
    pub picker: Picker,
    pub class: Class,
    pub roster: Roster,
    pub fields: SummaryFields,
}

impl SummaryStage {
    pub fn new(picker: Picker, class: Class, roster: Roster) -> SummaryStage {
        SummaryStage {
            picker,
            class,
            roster,
            fields: SummaryFields::default(),
        }
    }

    pub fn report(&self) -> NewAttendanceReport {
        let lesson = &self.picker.lesson;
        NewAttendanceReport {
            owner: lesson.owner,
            lesson: lesson.reference(),
            class: ClassRef {
                id: self.class.id,
                name: self.class.name.clone(),
                establishment: self.class.establishment.clone(),
            },
            attendees: self.roster.attendees(),
            bibles_count: self.fields.bibles(),
            magazines_count: self.fields.magazines(),
            visitors_count: self.fields.visitors(),
            offer_amount: self.fields.offer_amount(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_coerced() {
        assert_eq!(coerce_count(""), 0);
        assert_eq!(coerce_count("   "), 0);
        assert_eq!(coerce_count("12"), 12);
        assert_eq!(coerce_count(" 7 "), 7);
        assert_eq!(coerce_count("3.9"), 3);
        assert_eq!(coerce_count("-4"), 0);
        assert_eq!(coerce_count("abc"), 0);
        assert_eq!(coerce_count("NaN"), 0);
        assert_eq!(coerce_count("inf"), 0);
        assert_eq!(coerce_count("1e20"), u32::MAX);
    }

    #[test]
    fn offering_is_masked_while_typing() {
        let mut fields = SummaryFields::default();
        fields.set(SummaryField::OfferingAmount, "1234,567");
        assert_eq!(fields.offering_amount, "1.234,56");
        assert_eq!(fields.offer_amount(), 1234.56);

        fields.set(SummaryField::BibleCount, "x");
        assert_eq!(fields.bible_count, "x");
        assert_eq!(fields.bibles(), 0);
    }
}

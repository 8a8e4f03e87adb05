use crate::core::{InputRecord, OutputRecord, Transformer};
use crate::domain::model::{AgeGroup, FailureCause, ItemFailure};

/// 年齡分組，依序判斷：<25、25..=35、>35
pub fn age_group(age: i64) -> AgeGroup {
    match age {
        a if a < 25 => AgeGroup::Under25,
        25..=35 => AgeGroup::From25To35,
        _ => AgeGroup::Over35,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UserTransformer;

impl Transformer for UserTransformer {
    fn transform(&self, record: &InputRecord) -> Result<OutputRecord, ItemFailure> {
        if record.id.trim().is_empty() {
            return Err(ItemFailure::new(
                record.id.clone(),
                FailureCause::EmptyIdentifier,
            ));
        }

        Ok(OutputRecord {
            id: record.id.clone(),
            full_name: record.name.clone(),
            email: record.email.clone(),
            age_group: age_group(record.age),
        })
    }
}

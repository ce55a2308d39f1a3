use super::{Rewrite, Substitution};
use crate::extract::InsertPlan;

impl Rewrite for InsertPlan {
    fn substitutions(&self) -> Vec<Substitution> {
        self.values
            .iter()
            .map(|value| Substitution::encrypt(value.placeholder.clone(), &value.encryption_key))
            .collect()
    }
}

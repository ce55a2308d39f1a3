use super::{decrypt_columns, Rewrite, Substitution};
use crate::extract::SelectPlan;

impl Rewrite for SelectPlan {
    fn substitutions(&self) -> Vec<Substitution> {
        let projected = decrypt_columns(&self.columns);
        let wheres = self
            .wheres
            .iter()
            .map(|leaf| Substitution::decrypt(leaf.reference.clone(), &leaf.encryption_key));
        projected.chain(wheres).collect()
    }
}

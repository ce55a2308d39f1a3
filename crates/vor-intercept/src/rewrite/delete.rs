use super::{decrypt_columns, Rewrite, Substitution};
use crate::extract::DeletePlan;

impl Rewrite for DeletePlan {
    fn substitutions(&self) -> Vec<Substitution> {
        let wheres = self
            .wheres
            .iter()
            .map(|leaf| Substitution::decrypt(leaf.reference.clone(), &leaf.encryption_key));
        wheres.chain(decrypt_columns(&self.returning)).collect()
    }
}

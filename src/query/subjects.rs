//! Samples with their family grouping.

use indexmap::IndexMap;

use super::store::GenotypeStore;

/// One row of the `samples` table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Subject {
    pub name: String,
    pub family_id: Option<String>,
    pub paternal_id: Option<String>,
    pub maternal_id: Option<String>,
    pub sex: Option<String>,
    pub phenotype: Option<String>,
}

/// Mapping from sample name to subject, in table order.
pub type Subjects = IndexMap<String, Subject>;

/// Load the subjects, optionally restricted by an SQL condition on `samples`.
pub fn get_subjects(
    store: &dyn GenotypeStore,
    sample_filter: Option<&str>,
) -> Result<Subjects, anyhow::Error> {
    Ok(store
        .samples(sample_filter)?
        .into_iter()
        .map(|subject| (subject.name.clone(), subject))
        .collect())
}

/// Group all samples by family.
///
/// Samples without family are put into a family of their own, keyed by
/// their name.
pub fn get_family_dict(store: &dyn GenotypeStore) -> Result<IndexMap<String, Vec<Subject>>, anyhow::Error> {
    let mut families: IndexMap<String, Vec<Subject>> = IndexMap::new();
    for subject in store.samples(None)? {
        let key = subject
            .family_id
            .clone()
            .unwrap_or_else(|| subject.name.clone());
        families.entry(key).or_default().push(subject);
    }
    Ok(families)
}

/// The entries of `subjects` that are members of `family`.
pub fn subjects_in_family(subjects: &Subjects, family: &[Subject]) -> Subjects {
    subjects
        .iter()
        .filter(|(name, _)| family.iter().any(|member| &member.name == *name))
        .map(|(name, subject)| (name.clone(), subject.clone()))
        .collect()
}

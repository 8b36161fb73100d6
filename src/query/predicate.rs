//! Predicates over the set of samples carrying a variant.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::subjects::{subjects_in_family, Subject, Subjects};

/// Membership condition on the samples carrying a variant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InSubject {
    /// All subjects carry the variant.
    All,
    /// No subject carries the variant.
    None,
    /// The variant is carried by subjects only.
    Only,
    /// At least one subject carries the variant.
    Any,
}

/// A composable predicate on the carrier set of a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    All(HashSet<String>),
    None(HashSet<String>),
    /// Carriers (restricted to `subset` if given) are non-empty and all
    /// within `subjects`.
    Only {
        subjects: HashSet<String>,
        subset: Option<HashSet<String>>,
    },
    Any(HashSet<String>),
    /// Logical AND; vacuously true if empty.
    Conjunction(Vec<Predicate>),
    /// At least `min_kindreds` of the family predicates hold.
    FamilyWise {
        families: Vec<Predicate>,
        min_kindreds: usize,
    },
}

impl Predicate {
    /// Evaluate on the names of the samples carrying the variant.
    pub fn matches(&self, carriers: &HashSet<String>) -> bool {
        match self {
            Predicate::All(subjects) => subjects.is_subset(carriers),
            Predicate::None(subjects) => subjects.is_disjoint(carriers),
            Predicate::Only { subjects, subset } => {
                let check = match subset {
                    Some(subset) => subset.intersection(carriers).collect::<HashSet<_>>(),
                    None => carriers.iter().collect::<HashSet<_>>(),
                };
                !check.is_empty() && check.iter().all(|name| subjects.contains(*name))
            }
            Predicate::Any(subjects) => !subjects.is_disjoint(carriers),
            Predicate::Conjunction(predicates) => predicates.iter().all(|p| p.matches(carriers)),
            Predicate::FamilyWise {
                families,
                min_kindreds,
            } => {
                families
                    .iter()
                    .filter(|p| p.matches(carriers))
                    .count()
                    >= *min_kindreds
            }
        }
    }
}

/// Build the conjunction of one base predicate per mode in `modes`.
///
/// An empty `subset` is treated like no subset.
pub fn select_subjects_predicate<'a, I>(
    subjects: I,
    modes: &[InSubject],
    subset: Option<&[String]>,
) -> Predicate
where
    I: IntoIterator<Item = &'a Subject>,
{
    let subjects = subjects
        .into_iter()
        .map(|subject| subject.name.clone())
        .collect::<HashSet<_>>();
    let subset = subset
        .filter(|subset| !subset.is_empty())
        .map(|subset| subset.iter().cloned().collect::<HashSet<_>>());

    let mut predicates = Vec::new();
    if modes.contains(&InSubject::All) {
        predicates.push(Predicate::All(subjects.clone()));
    }
    if modes.contains(&InSubject::None) {
        predicates.push(Predicate::None(subjects.clone()));
    }
    if modes.contains(&InSubject::Only) {
        predicates.push(Predicate::Only {
            subjects: subjects.clone(),
            subset,
        });
    }
    if modes.contains(&InSubject::Any) {
        predicates.push(Predicate::Any(subjects));
    }
    Predicate::Conjunction(predicates)
}

/// Build one predicate per family and require `min_kindreds` to hold.
///
/// For each family, the subjects are the entries of `subjects` in the family
/// and the family's member names are the subset for `only`.
pub fn family_wise_predicate(
    families: &IndexMap<String, Vec<Subject>>,
    subjects: &Subjects,
    modes: &[InSubject],
    min_kindreds: usize,
) -> Predicate {
    let families = families
        .values()
        .map(|family| {
            let family_names = family.iter().map(|s| s.name.clone()).collect::<Vec<_>>();
            let in_family = subjects_in_family(subjects, family);
            select_subjects_predicate(in_family.values(), modes, Some(&family_names))
        })
        .collect();
    Predicate::FamilyWise {
        families,
        min_kindreds,
    }
}

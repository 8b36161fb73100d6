//! Restriction of a variant query to a genomic region.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

static RE_REGION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<chrom>[^:\s]+)(:(?P<start>[\d,]+)-(?P<end>[\d,]+))?$")
        .expect("invalid regex in source code")
});

static RE_WHERE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bwhere\b").expect("invalid regex in source code"));

static RE_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(group\s+by|order\s+by|limit)\b").expect("invalid regex in source code")
});

/// A chromosome, optionally with an inclusive `start-end` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chrom: String,
    pub range: Option<(u64, u64)>,
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RE_REGION
            .captures(s.trim())
            .ok_or_else(|| anyhow::anyhow!("malformed region {:?}, use chrom:start-end or chrom", s))?;
        let chrom = caps["chrom"].to_string();
        let range = match (caps.name("start"), caps.name("end")) {
            (Some(start), Some(end)) => {
                let parse = |v: &str| -> Result<u64, anyhow::Error> {
                    v.replace(',', "")
                        .parse()
                        .map_err(|e| anyhow::anyhow!("invalid position in region {:?}: {}", s, e))
                };
                let (start, end) = (parse(start.as_str())?, parse(end.as_str())?);
                if start > end {
                    anyhow::bail!("region start is after end in {:?}", s);
                }
                Some((start, end))
            }
            _ => None,
        };
        Ok(Self { chrom, range })
    }
}

impl Region {
    /// SQL condition on the `chrom`, `start` and `end` columns.
    pub fn condition(&self) -> String {
        let chrom = format!("chrom = '{}'", self.chrom.replace('\'', "''"));
        match self.range {
            Some((start, end)) => format!(
                "{} AND ((start BETWEEN {} AND {}) OR (end BETWEEN {} AND {}))",
                chrom, start, end, start, end
            ),
            None => chrom,
        }
    }
}

/// Add `condition` to the WHERE clause of `query`.
///
/// An existing condition is combined with AND; otherwise a WHERE clause is
/// inserted before any GROUP BY, ORDER BY or LIMIT.
pub fn add_condition(query: &str, condition: &str) -> String {
    let query = query.trim().trim_end_matches(';');
    match RE_WHERE.find(query) {
        Some(m) => {
            let rest = &query[m.end()..];
            let (existing, tail) = match RE_TAIL.find(rest) {
                Some(t) => (&rest[..t.start()], &rest[t.start()..]),
                None => (rest, ""),
            };
            let mut result = format!(
                "{} WHERE ({}) AND ({})",
                query[..m.start()].trim_end(),
                existing.trim(),
                condition
            );
            if !tail.is_empty() {
                result.push(' ');
                result.push_str(tail.trim());
            }
            result
        }
        None => match RE_TAIL.find(query) {
            Some(t) => format!(
                "{} WHERE {} {}",
                query[..t.start()].trim_end(),
                condition,
                &query[t.start()..]
            ),
            None => format!("{} WHERE {}", query, condition),
        },
    }
}

/// Restrict `query` to `region`.
pub fn add_region_to_query(query: &str, region: &Region) -> String {
    add_condition(query, &region.condition())
}

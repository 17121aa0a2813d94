//! Ranged attribute retrieval
//!
//! Servers such as Active Directory return at most `MaxValRange` values of a
//! multi-valued attribute per response. The remaining values are read by
//! asking for `member;range=<low>-<high>` repeatedly:
//! - request `member;range=0-999`, server answers `member;range=0-999`
//! - request `member;range=1000-1999`, server answers `member;range=1000-1499`
//!   (its own cap) and the next request starts at 1500
//! - the reply `member;range=3000-*` carries the last values

use async_trait::async_trait;
use rolebridge_core::{DirectoryEntry, Error, Lookup, Result, DEFAULT_RANGE_PAGE_SIZE};
use tracing::debug;

/// Reads one entry with a single requested attribute description.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Fetch `dn` asking only for `attribute_description`
    /// (e.g. `member;range=0-999`).
    async fn fetch_range(
        &self,
        dn: &str,
        attribute_description: &str,
    ) -> Result<Lookup<DirectoryEntry>>;
}

/// Bounds carried by a `range=<start>-<end>` option; `end` is `None` for `*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeBounds {
    pub start: usize,
    pub end: Option<usize>,
}

impl RangeBounds {
    /// Parse the range option of an attribute description.
    ///
    /// Returns `Ok(None)` for a description without a range option.
    pub fn parse(description: &str) -> Result<Option<Self>> {
        let range = description.split(';').skip(1).find_map(|option| {
            option
                .get(..6)
                .filter(|prefix| prefix.eq_ignore_ascii_case("range="))
                .map(|_| &option[6..])
        });

        let range = match range {
            Some(r) => r,
            None => return Ok(None),
        };

        let malformed = || Error::MalformedRange(format!("Unparsable range in '{}'", description));

        let (low, high) = range.split_once('-').ok_or_else(malformed)?;
        let start = low.trim().parse::<usize>().map_err(|_| malformed())?;
        let end = match high.trim() {
            "*" => None,
            value => Some(value.parse::<usize>().map_err(|_| malformed())?),
        };

        if let Some(end) = end {
            if end < start {
                return Err(malformed());
            }
        }

        Ok(Some(Self { start, end }))
    }

    pub fn is_final(&self) -> bool {
        self.end.is_none()
    }
}

/// Whether `description` names `attribute`, ignoring options and case
fn describes(description: &str, attribute: &str) -> bool {
    description
        .split(';')
        .next()
        .is_some_and(|base| base.eq_ignore_ascii_case(attribute))
}

/// Pick the values returned for `attribute`, preferring a ranged description
fn returned_values<'a>(entry: &'a DirectoryEntry, attribute: &str) -> Option<(&'a str, &'a [String])> {
    let mut bare = None;
    for (description, values) in &entry.attributes {
        if !describes(description, attribute) {
            continue;
        }
        if description.contains(';') {
            return Some((description.as_str(), values.as_slice()));
        }
        bare = Some((description.as_str(), values.as_slice()));
    }
    bare
}

/// Drives successive range requests until the server reports the last range.
#[derive(Debug, Clone)]
pub struct RangedRetrieval {
    page_size: usize,
}

impl Default for RangedRetrieval {
    fn default() -> Self {
        Self::new(DEFAULT_RANGE_PAGE_SIZE)
    }
}

impl RangedRetrieval {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Collect every value of `attribute` on `dn`.
    ///
    /// `NotFound` only when the entry is missing on the first request. Any
    /// fault discards what was gathered so far.
    pub async fn retrieve(
        &self,
        source: &dyn RangeSource,
        dn: &str,
        attribute: &str,
    ) -> Result<Lookup<Vec<String>>> {
        let mut values: Vec<String> = Vec::new();
        let mut start = 0usize;

        loop {
            let requested = format!(
                "{};range={}-{}",
                attribute,
                start,
                start.saturating_add(self.page_size - 1)
            );

            let entry = match source.fetch_range(dn, &requested).await? {
                Lookup::Found(entry) => entry,
                Lookup::NotFound if start == 0 => return Ok(Lookup::NotFound),
                Lookup::NotFound => {
                    return Err(Error::MalformedRange(format!(
                        "{} disappeared after {} values",
                        dn, start
                    )))
                }
            };

            let (description, chunk) = match returned_values(&entry, attribute) {
                Some(found) => found,
                // Nothing at all for the attribute: no (more) values
                None => break,
            };

            let bounds = match RangeBounds::parse(description)? {
                Some(bounds) => bounds,
                None if start == 0 => {
                    // Server ignored ranging and sent the whole attribute
                    values.extend_from_slice(chunk);
                    break;
                }
                None => {
                    return Err(Error::MalformedRange(format!(
                        "Server dropped the range option after {} values of {}",
                        start, attribute
                    )))
                }
            };

            if bounds.start != start {
                return Err(Error::MalformedRange(format!(
                    "Requested values from {} but server returned '{}'",
                    start, description
                )));
            }

            debug!(
                range = description,
                count = chunk.len(),
                total = values.len() + chunk.len(),
                "Retrieved attribute range"
            );

            match bounds.end {
                None => {
                    values.extend_from_slice(chunk);
                    break;
                }
                Some(_) if chunk.is_empty() => {
                    return Err(Error::MalformedRange(format!(
                        "Non-final range '{}' carried no values",
                        description
                    )));
                }
                Some(end) => {
                    // parse guarantees end >= start, chunk is non-empty here
                    if end - start != chunk.len() - 1 {
                        return Err(Error::MalformedRange(format!(
                            "Range '{}' announced {} values but carried {}",
                            description,
                            (end - start).saturating_add(1),
                            chunk.len()
                        )));
                    }
                    // Continue from what was actually returned
                    start += chunk.len();
                    values.extend_from_slice(chunk);
                }
            }
        }

        Ok(Lookup::Found(values))
    }

    /// Make `entry` carry every value of `attribute` under the bare name.
    ///
    /// A capped server answers a plain read of a large attribute with its
    /// first range only (`member;range=0-1499`); the rest is read from `source`.
    pub async fn complete_entry(
        &self,
        source: &dyn RangeSource,
        mut entry: DirectoryEntry,
        attribute: &str,
    ) -> Result<DirectoryEntry> {
        let (bounds, first_chunk) = match returned_values(&entry, attribute) {
            Some((description, chunk)) => (RangeBounds::parse(description)?, chunk.to_vec()),
            None => return Ok(entry),
        };

        let values = match bounds {
            None => return Ok(entry),
            Some(bounds) if bounds.start != 0 => {
                return Err(Error::MalformedRange(format!(
                    "{} of {} started at value {}",
                    attribute, entry.dn, bounds.start
                )))
            }
            Some(bounds) if bounds.is_final() => first_chunk,
            Some(_) => match self.retrieve(source, &entry.dn, attribute).await? {
                Lookup::Found(values) => values,
                Lookup::NotFound => {
                    return Err(Error::MalformedRange(format!(
                        "{} disappeared while reading {}",
                        entry.dn, attribute
                    )))
                }
            },
        };

        debug!(dn = %entry.dn, count = values.len(), "Completed ranged attribute");

        entry
            .attributes
            .retain(|description, _| !describes(description, attribute));
        entry.attributes.insert(attribute.to_string(), values);
        Ok(entry)
    }
}

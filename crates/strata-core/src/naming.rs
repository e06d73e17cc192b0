//! Identifier normalization: schema path segments → safe, length-bounded
//! table and column names.
//!
//! Pipeline per segment:
//!   raw name
//!     └─ camel_to_snake()   → lower-case, `_`-separated, `[a-z0-9_]` only
//!          └─ abbreviate()  → caller substitutions, applied to a fixpoint
//! then segments are joined with [`SEPARATOR`] and the result is fitted to the
//! dialect's identifier limit by middle truncation plus a stable hash.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Joins path segments in flattened identifiers.
pub const SEPARATOR: &str = "__";

const HASH_LEN: usize = 8;
const MAX_ABBREVIATION_PASSES: usize = 16;

/// Converts a mixed/camel-case name into lower snake case.
///
/// `SubjectProperty` → `subject_property`, `AbbTRLC` → `abb_trlc`,
/// `HTTPServer` → `http_server`. Characters outside `[a-z0-9_]` become `_`.
pub fn camel_to_snake(name: &str) -> String {
  let chars: Vec<char> = name.chars().collect();
  let mut out = String::with_capacity(name.len() + 4);
  for (i, &c) in chars.iter().enumerate() {
    if c.is_uppercase() && i > 0 {
      let prev = chars[i - 1];
      let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
      if prev != '_' && (prev.is_lowercase() || prev.is_ascii_digit() || next_lower) {
        out.push('_');
      }
    }
    for l in c.to_lowercase() {
      out.push(if l.is_ascii_lowercase() || l.is_ascii_digit() || l == '_' { l } else { '_' });
    }
  }
  out
}

/// Builds identifiers for one model build.
///
/// Holds no "seen" state; collision detection is scoped to the table under
/// construction by the model builder.
#[derive(Debug, Clone)]
pub struct Normalizer {
  /// Normalized `(from, to)` pairs, longest `from` first.
  abbreviations: Vec<(String, String)>,
  max_len:       usize,
}

impl Normalizer {
  pub fn new(abbreviations: &BTreeMap<String, String>, max_len: usize) -> Result<Self> {
    let mut pairs: Vec<(String, String)> = abbreviations
      .iter()
      .map(|(from, to)| (camel_to_snake(from), camel_to_snake(to)))
      .collect();

    for (from, to) in &pairs {
      let breaks_fixpoint =
        from.is_empty() || pairs.iter().any(|(key, _)| to.contains(key.as_str()));
      if breaks_fixpoint {
        return Err(Error::InvalidAbbreviation {
          from: from.clone(),
          to:   to.clone(),
        });
      }
    }

    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    Ok(Self { abbreviations: pairs, max_len })
  }

  pub fn max_len(&self) -> usize { self.max_len }

  /// Normalize a path into one identifier.
  pub fn normalize<S: AsRef<str>>(&self, segments: &[S]) -> String {
    self.fit(self.join(segments))
  }

  /// Normalize a path and append a literal suffix (e.g. `_id`) before the
  /// length limit is applied.
  pub fn normalize_with_suffix<S: AsRef<str>>(&self, segments: &[S], suffix: &str) -> String {
    let mut joined = self.join(segments);
    joined.push_str(suffix);
    self.fit(joined)
  }

  fn join<S: AsRef<str>>(&self, segments: &[S]) -> String {
    segments
      .iter()
      .map(|s| self.abbreviate(camel_to_snake(s.as_ref())))
      .collect::<Vec<_>>()
      .join(SEPARATOR)
  }

  fn abbreviate(&self, mut segment: String) -> String {
    for _ in 0..MAX_ABBREVIATION_PASSES {
      let mut changed = false;
      for (from, to) in &self.abbreviations {
        if segment.contains(from.as_str()) {
          segment = segment.replace(from.as_str(), to);
          changed = true;
        }
      }
      if !changed {
        break;
      }
    }
    segment
  }

  /// Truncate from the middle, keeping head and tail context, and append a
  /// hash of the full identifier.
  fn fit(&self, ident: String) -> String {
    if ident.len() <= self.max_len {
      return ident;
    }
    let tail_len = self.max_len / 4;
    let head_len = self.max_len.saturating_sub(tail_len + HASH_LEN + 2);
    let digest = hex::encode(Sha256::digest(ident.as_bytes()));

    // `camel_to_snake` only emits ASCII, so byte slicing is on char bounds.
    format!(
      "{}_{}_{}",
      &ident[..head_len],
      &ident[ident.len() - tail_len..],
      &digest[..HASH_LEN]
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn normalizer() -> Normalizer {
    let abbreviations =
      BTreeMap::from([("AbbreviateThisReallyLongColumn".to_owned(), "AbbTRLC".to_owned())]);
    Normalizer::new(&abbreviations, 63).unwrap()
  }

  #[test]
  fn camel_case_segments() {
    assert_eq!(camel_to_snake("SubjectProperty"), "subject_property");
    assert_eq!(camel_to_snake("ZipCode"), "zip_code");
    assert_eq!(camel_to_snake("aBunchOfDocuments"), "a_bunch_of_documents");
    assert_eq!(camel_to_snake("AbbTRLC"), "abb_trlc");
    assert_eq!(camel_to_snake("HTTPServer"), "http_server");
    assert_eq!(camel_to_snake("Address2Line"), "address2_line");
    assert_eq!(camel_to_snake("already_snake"), "already_snake");
    assert_eq!(camel_to_snake("with-dash.dot"), "with_dash_dot");
  }

  #[test]
  fn joins_with_double_separator() {
    let n = normalizer();
    assert_eq!(
      n.normalize(&["SubjectProperty", "Address", "Latitude"]),
      "subject_property__address__latitude"
    );
    assert_eq!(n.normalize_with_suffix(&["SubjectProperty", "Address"], "_id"), "subject_property__address_id");
  }

  #[test]
  fn applies_abbreviations() {
    let n = normalizer();
    assert_eq!(n.normalize(&["Loan", "AbbreviateThisReallyLongColumn"]), "loan__abb_trlc");
  }

  #[test]
  fn rejects_abbreviation_containing_a_key() {
    let abbreviations = BTreeMap::from([("Addr".to_owned(), "Address".to_owned())]);
    assert!(matches!(
      Normalizer::new(&abbreviations, 63),
      Err(Error::InvalidAbbreviation { .. })
    ));
  }

  #[test]
  fn truncates_long_identifiers_from_the_middle() {
    let n = normalizer();
    let segments = ["SomeExtremelyLongSectionName", "WithAnotherVeryLongChildName", "AndAFinalLeafValue"];
    let full = n.join(&segments);
    assert!(full.len() > 63);

    let ident = n.normalize(&segments);
    assert_eq!(ident.len(), 63);
    assert!(ident.starts_with("some_extremely_long_section_name"));
    assert!(ident[..ident.len() - HASH_LEN - 1].ends_with("leaf_value"));
    assert_eq!(ident, n.normalize(&segments));

    let other = n.normalize(&["SomeExtremelyLongSectionName", "WithAnotherVeryLongChildNamX", "AndAFinalLeafValue"]);
    assert_ne!(ident, other);
  }

  #[test]
  fn normalization_is_idempotent() {
    let n = normalizer();
    let inputs: &[&[&str]] = &[
      &["SubjectProperty", "Address"],
      &["Loan", "AbbreviateThisReallyLongColumn"],
      &["aBunchOfDocuments"],
      &["SomeExtremelyLongSectionName", "WithAnotherVeryLongChildName", "AndAFinalLeafValue"],
      &["HTTPServer", "Port"],
    ];
    for segments in inputs {
      let once = n.normalize(segments);
      assert_eq!(n.normalize(&[once.as_str()]), once, "not idempotent for {segments:?}");
    }
  }
}

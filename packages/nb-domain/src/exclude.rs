use globset::{Glob, GlobSet, GlobSetBuilder};

/// A pattern that failed to compile. The remaining patterns still apply.
#[derive(Debug)]
pub struct RejectedPattern {
	pub pattern: String,
	pub error: globset::Error,
}

/// Compiled exclusion globs, matched against `/`-separated paths relative to the notes root.
///
/// `*` also crosses `/`, and a path is excluded when it or any of its ancestor directories
/// matches, so excluding a directory excludes everything beneath it.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
	set: GlobSet,
}
impl ExclusionFilter {
	pub fn new<S>(patterns: &[S]) -> (Self, Vec<RejectedPattern>)
	where
		S: AsRef<str>,
	{
		let mut builder = GlobSetBuilder::new();
		let mut rejected = Vec::new();

		for pattern in patterns {
			let pattern = pattern.as_ref();

			match Glob::new(pattern) {
				Ok(glob) => {
					builder.add(glob);
				},
				Err(error) => rejected.push(RejectedPattern { pattern: pattern.to_string(), error }),
			}
		}

		let set = match builder.build() {
			Ok(set) => set,
			Err(error) => {
				rejected.push(RejectedPattern { pattern: patterns_label(patterns), error });

				GlobSet::empty()
			},
		};

		(Self { set }, rejected)
	}

	pub fn empty() -> Self {
		Self { set: GlobSet::empty() }
	}

	pub fn is_excluded(&self, rel_path: &str) -> bool {
		if self.set.is_empty() || rel_path.is_empty() {
			return false;
		}
		if self.set.is_match(rel_path) {
			return true;
		}

		rel_path
			.match_indices('/')
			.any(|(index, _)| index > 0 && self.set.is_match(&rel_path[..index]))
	}
}

fn patterns_label<S>(patterns: &[S]) -> String
where
	S: AsRef<str>,
{
	patterns.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn filter(patterns: &[&str]) -> ExclusionFilter {
		let (filter, rejected) = ExclusionFilter::new(patterns);

		assert!(rejected.is_empty(), "Unexpected rejected patterns: {rejected:?}");

		filter
	}

	#[test]
	fn excluded_directory_covers_descendants() {
		let filter = filter(&[".git", "archive"]);

		assert!(filter.is_excluded(".git"));
		assert!(filter.is_excluded(".git/objects/ab.md"));
		assert!(filter.is_excluded("archive/2020/old.md"));
		assert!(!filter.is_excluded("notes/archive.md"));
	}

	#[test]
	fn star_crosses_separators() {
		let filter = filter(&["*.tmp.md", "drafts/*"]);

		assert!(filter.is_excluded("a/b/c.tmp.md"));
		assert!(filter.is_excluded("drafts/x/y.md"));
		assert!(!filter.is_excluded("a/b/c.md"));
	}

	#[test]
	fn invalid_patterns_are_reported_and_skipped() {
		let (filter, rejected) = ExclusionFilter::new(&["[unclosed", "private"]);

		assert_eq!(rejected.len(), 1);
		assert_eq!(rejected[0].pattern, "[unclosed");
		assert!(filter.is_excluded("private/secret.md"));
	}

	#[test]
	fn empty_filter_excludes_nothing() {
		assert!(!ExclusionFilter::empty().is_excluded("anything.md"));
	}
}

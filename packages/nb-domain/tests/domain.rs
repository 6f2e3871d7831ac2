use std::path::PathBuf;

use time::macros::datetime;

use nb_domain::{
	conflict::{self, Resolution, Side, Snapshot},
	front_matter,
	note::{self, Note},
	version,
};

const TODAY: &str = "---\ntitle: Today\ntags:\n  - daily\n---\n\n# Today\n\nWrote things.\n";

fn parse(rel: &str, content: &str) -> Note {
	Note::from_content(PathBuf::from("/notes").join(rel), rel.to_string(), content)
}

#[test]
fn parsed_note_carries_slug_and_ordered_front_matter() {
	let parsed = parse("daily/today.md", TODAY);

	assert_eq!(parsed.slug, "today");
	assert_eq!(parsed.raw_front_matter, "title: Today\ntags:\n  - daily\n");
	assert_eq!(parsed.front_matter_json, r#"{"title":"Today","tags":["daily"]}"#);
	assert_eq!(parsed.body, "# Today\n\nWrote things.\n");
	assert_eq!(parsed.origin, None);
	assert_eq!(parsed.version, None);
}

#[test]
fn rewritten_note_keeps_its_hash() {
	let parsed = parse("today.md", TODAY);
	let rewritten = parse("today.md", &parsed.canonical_text());

	assert_eq!(rewritten.hash(), parsed.hash());
	assert_eq!(rewritten.front_matter_json, parsed.front_matter_json);
}

#[test]
fn regenerated_yaml_parses_back_to_the_same_json() {
	let json = r#"{"title":"Today","tags":["daily","work"]}"#;
	let yaml = front_matter::to_yaml(json).expect("Failed to render YAML.");

	assert_eq!(front_matter::to_json(&yaml), json);
}

#[test]
fn newer_disk_copy_wins_a_disk_edit() {
	let stored = parse("today.md", TODAY);
	let edited = parse("today.md", &TODAY.replace("Wrote things.", "Wrote more things."));
	let older = version::format(datetime!(2026-01-01 09:00 UTC)).expect("Failed to format.");
	let newer = version::format(datetime!(2026-01-01 10:00 UTC)).expect("Failed to format.");
	let stored_hash = stored.hash();
	let edited_hash = edited.hash();

	assert_eq!(
		conflict::resolve(
			Snapshot::new(&stored_hash, Some(&older)),
			Snapshot::new(&edited_hash, Some(&newer)),
			Side::Disk,
		),
		Resolution::DiskWins
	);
	assert_eq!(
		conflict::resolve(
			Snapshot::new(&stored_hash, Some(&newer)),
			Snapshot::new(&edited_hash, Some(&older)),
			Side::Disk,
		),
		Resolution::DbWins
	);
}

#[test]
fn placeholder_and_non_markdown_paths_are_recognized() {
	let untitled = parse("Untitled.md", "");

	assert!(note::is_placeholder(&untitled.slug, &["Untitled"]));
	assert!(!note::is_placeholder("today", &["Untitled"]));
	assert!(note::is_markdown(&PathBuf::from("/notes/a.MD")));
	assert!(!note::is_markdown(&PathBuf::from("/notes/a.txt")));
}

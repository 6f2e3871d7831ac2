use crate::version;

/// Which side asked for the write being decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	Disk,
	Db,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	/// Both sides already hold the same content.
	InSync,
	DiskWins,
	DbWins,
}

/// Content digest and version stamp of one side.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
	pub hash: &'a str,
	pub version: Option<&'a str>,
}
impl<'a> Snapshot<'a> {
	pub fn new(hash: &'a str, version: Option<&'a str>) -> Self {
		Self { hash, version }
	}
}

/// Decides which side's content should survive.
///
/// Equal hashes never write. A missing or unparsable version on either side lets the invoking
/// side proceed. Otherwise the side whose version is not strictly older wins, so equal versions
/// also favour the invoker.
pub fn resolve(db: Snapshot<'_>, disk: Snapshot<'_>, invoker: Side) -> Resolution {
	if db.hash == disk.hash {
		return Resolution::InSync;
	}

	let winner = match (db.version.and_then(version::parse), disk.version.and_then(version::parse))
	{
		(Some(db_at), Some(disk_at)) =>
			if db_at > disk_at {
				Side::Db
			} else if disk_at > db_at {
				Side::Disk
			} else {
				invoker
			},
		_ => invoker,
	};

	match winner {
		Side::Disk => Resolution::DiskWins,
		Side::Db => Resolution::DbWins,
	}
}

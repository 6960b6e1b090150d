//! Protocol commands.
//!
//! [`Command`] is a closed set: every variant renders its own wire text and
//! classifies its own replies, with [`codec::short_circuit`] applied first and
//! [`codec::fallback`] for codes the variant does not know.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec;
use crate::error::{ProtocolError, Result};
use crate::outcome::{AnimeInfo, EpisodeInfo, FileInfo, Outcome, Payload};

const FILE_MASK: &str = "70000000";
const FILE_ANIME_MASK: &str = "00000000";
const ANIME_MASK: &str = "b0800000";

/// How a command addresses a file: by AniDB file id, or by ed2k hash and size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRef {
    Id(u64),
    Hash { ed2k: String, size: u64 },
}

impl FileRef {
    pub fn by_id(fid: u64) -> Result<Self> {
        if fid == 0 {
            return Err(ProtocolError::InvalidCommand("file id must be non-zero".to_string()));
        }
        Ok(FileRef::Id(fid))
    }

    /// The hash is stored lowercase so both spellings share a dedup key.
    pub fn by_hash(ed2k: impl AsRef<str>, size: u64) -> Result<Self> {
        let ed2k = ed2k.as_ref().trim();
        if ed2k.len() != 32 || !ed2k.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidCommand(format!(
                "ed2k hash must be 32 hex digits, got {:?}",
                ed2k
            )));
        }
        if size == 0 {
            return Err(ProtocolError::InvalidCommand("file size must be non-zero".to_string()));
        }
        Ok(FileRef::Hash {
            ed2k: ed2k.to_ascii_lowercase(),
            size,
        })
    }

    fn params(&self) -> String {
        match self {
            FileRef::Id(fid) => format!("fid={}", fid),
            FileRef::Hash { ed2k, size } => format!("size={}&ed2k={}", size, ed2k),
        }
    }

    fn key_suffix(&self) -> String {
        match self {
            FileRef::Id(fid) => format!("F{}", fid),
            FileRef::Hash { ed2k, .. } => ed2k.clone(),
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRef::Id(fid) => write!(f, "F{}", fid),
            FileRef::Hash { ed2k, size } => write!(f, "{} ({} bytes)", ed2k, size),
        }
    }
}

/// Storage state of a list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MyListState {
    #[default]
    Unknown,
    /// On a local disk
    Internal,
    /// On removable media (CD/DVD)
    External,
    Deleted,
    Remote,
}

impl MyListState {
    pub fn code(&self) -> u8 {
        match self {
            MyListState::Unknown => 0,
            MyListState::Internal => 1,
            MyListState::External => 2,
            MyListState::Deleted => 3,
            MyListState::Remote => 4,
        }
    }
}

/// What a queue is busy with while a command executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    GettingFileInfo,
    GettingAnimeInfo,
    GettingEpisodeInfo,
    AddingFileToMyList,
    MarkingFileExternal,
    UpdatingWatchedState,
    RemovingFileFromMyList,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::GettingFileInfo => "GettingFileInfo",
            ActivityKind::GettingAnimeInfo => "GettingAnimeInfo",
            ActivityKind::GettingEpisodeInfo => "GettingEpisodeInfo",
            ActivityKind::AddingFileToMyList => "AddingFileToMyList",
            ActivityKind::MarkingFileExternal => "MarkingFileExternal",
            ActivityKind::UpdatingWatchedState => "UpdatingWatchedState",
            ActivityKind::RemovingFileFromMyList => "RemovingFileFromMyList",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol operation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Mark a list entry as stored on external media.
    MarkFileAsDisk { file: FileRef },
    AddFileToMyList {
        file: FileRef,
        state: MyListState,
        watched: bool,
    },
    UpdateFileWatched { file: FileRef, watched: bool },
    RemoveFileFromMyList { file: FileRef },
    GetFileInfo { file: FileRef },
    GetAnimeInfo { anime_id: u64 },
    GetEpisodeInfo { episode_id: u64 },
}

impl Command {
    pub fn mark_file_as_disk(file: FileRef) -> Self {
        Command::MarkFileAsDisk { file }
    }

    pub fn add_file_to_mylist(file: FileRef, state: MyListState, watched: bool) -> Self {
        Command::AddFileToMyList {
            file,
            state,
            watched,
        }
    }

    pub fn update_file_watched(file: FileRef, watched: bool) -> Self {
        Command::UpdateFileWatched { file, watched }
    }

    pub fn remove_file_from_mylist(file: FileRef) -> Self {
        Command::RemoveFileFromMyList { file }
    }

    pub fn get_file_info(file: FileRef) -> Self {
        Command::GetFileInfo { file }
    }

    pub fn get_anime_info(anime_id: u64) -> Result<Self> {
        if anime_id == 0 {
            return Err(ProtocolError::InvalidCommand("anime id must be non-zero".to_string()));
        }
        Ok(Command::GetAnimeInfo { anime_id })
    }

    pub fn get_episode_info(episode_id: u64) -> Result<Self> {
        if episode_id == 0 {
            return Err(ProtocolError::InvalidCommand(
                "episode id must be non-zero".to_string(),
            ));
        }
        Ok(Command::GetEpisodeInfo { episode_id })
    }

    /// Protocol keyword of the rendered text.
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::MarkFileAsDisk { .. }
            | Command::AddFileToMyList { .. }
            | Command::UpdateFileWatched { .. } => "MYLISTADD",
            Command::RemoveFileFromMyList { .. } => "MYLISTDEL",
            Command::GetFileInfo { .. } => "FILE",
            Command::GetAnimeInfo { .. } => "ANIME",
            Command::GetEpisodeInfo { .. } => "EPISODE",
        }
    }

    /// Wire text without the session key.
    pub fn render(&self) -> String {
        let params = match self {
            Command::MarkFileAsDisk { file } => {
                format!("{}&state={}&edit=1", file.params(), MyListState::External.code())
            }
            Command::AddFileToMyList {
                file,
                state,
                watched,
            } => format!(
                "{}&state={}&viewed={}",
                file.params(),
                state.code(),
                u8::from(*watched)
            ),
            Command::UpdateFileWatched { file, watched } => {
                format!("{}&viewed={}&edit=1", file.params(), u8::from(*watched))
            }
            Command::RemoveFileFromMyList { file } => file.params(),
            Command::GetFileInfo { file } => format!(
                "{}&fmask={}&amask={}",
                file.params(),
                FILE_MASK,
                FILE_ANIME_MASK
            ),
            Command::GetAnimeInfo { anime_id } => format!("aid={}&amask={}", anime_id, ANIME_MASK),
            Command::GetEpisodeInfo { episode_id } => format!("eid={}", episode_id),
        };
        format!("{} {}", self.keyword(), params)
    }

    /// Identifier shared by commands doing the same work.
    pub fn dedup_key(&self) -> String {
        match self {
            Command::MarkFileAsDisk { file } => format!("MarkFileAsDisk_{}", file.key_suffix()),
            Command::AddFileToMyList { file, .. } => {
                format!("AddFileToMyList_{}", file.key_suffix())
            }
            Command::UpdateFileWatched { file, watched } => format!(
                "UpdateFileWatched_{}_{}",
                file.key_suffix(),
                u8::from(*watched)
            ),
            Command::RemoveFileFromMyList { file } => {
                format!("RemoveFileFromMyList_{}", file.key_suffix())
            }
            Command::GetFileInfo { file } => format!("GetFileInfo_{}", file.key_suffix()),
            Command::GetAnimeInfo { anime_id } => format!("GetAnimeInfo_{}", anime_id),
            Command::GetEpisodeInfo { episode_id } => format!("GetEpisodeInfo_{}", episode_id),
        }
    }

    pub fn activity(&self) -> ActivityKind {
        match self {
            Command::MarkFileAsDisk { .. } => ActivityKind::MarkingFileExternal,
            Command::AddFileToMyList { .. } => ActivityKind::AddingFileToMyList,
            Command::UpdateFileWatched { .. } => ActivityKind::UpdatingWatchedState,
            Command::RemoveFileFromMyList { .. } => ActivityKind::RemovingFileFromMyList,
            Command::GetFileInfo { .. } => ActivityKind::GettingFileInfo,
            Command::GetAnimeInfo { .. } => ActivityKind::GettingAnimeInfo,
            Command::GetEpisodeInfo { .. } => ActivityKind::GettingEpisodeInfo,
        }
    }

    /// Classifies a reply. Total: every code maps to some outcome.
    pub fn parse_outcome(&self, code: u16, body: &str) -> Outcome {
        if let Some(outcome) = codec::short_circuit(code, body) {
            return outcome;
        }
        self.parse_own(code, body)
            .unwrap_or_else(|| codec::fallback(code, body))
    }

    fn parse_own(&self, code: u16, body: &str) -> Option<Outcome> {
        let outcome = match (self, code) {
            (Command::MarkFileAsDisk { .. }, 210 | 310 | 311) => Outcome::Success(Payload::Ack),
            (Command::MarkFileAsDisk { .. }, 320 | 411) => Outcome::NotFound,

            (Command::AddFileToMyList { .. }, 210) => match first_field(body) {
                Some(lid) => Outcome::Success(Payload::MyListEntry {
                    lid: Some(lid),
                    already_listed: false,
                }),
                None => Outcome::transient("MYLIST ENTRY ADDED without list id"),
            },
            (Command::AddFileToMyList { .. }, 310) => Outcome::Success(Payload::MyListEntry {
                lid: first_field(body),
                already_listed: true,
            }),
            (Command::AddFileToMyList { .. }, 320 | 330 | 350) => Outcome::NotFound,

            (Command::UpdateFileWatched { .. }, 311) => Outcome::Success(Payload::Ack),
            (Command::UpdateFileWatched { .. }, 411) => Outcome::NotFound,

            (Command::RemoveFileFromMyList { .. }, 211) => Outcome::Success(Payload::Ack),
            (Command::RemoveFileFromMyList { .. }, 411) => Outcome::NotFound,

            (Command::GetFileInfo { .. }, 220) => parse_file(body),
            (Command::GetFileInfo { .. }, 320) => Outcome::NotFound,
            (Command::GetFileInfo { .. }, 322) => Outcome::transient("multiple files found"),

            (Command::GetAnimeInfo { .. }, 230) => parse_anime(body),
            (Command::GetAnimeInfo { .. }, 330) => Outcome::NotFound,

            (Command::GetEpisodeInfo { .. }, 240) => parse_episode(body),
            (Command::GetEpisodeInfo { .. }, 340) => Outcome::NotFound,

            _ => return None,
        };
        Some(outcome)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dedup_key())
    }
}

fn first_field(body: &str) -> Option<u64> {
    codec::first_record(body)?.first()?.parse().ok()
}

fn parse_file(body: &str) -> Outcome {
    let fields = codec::first_record(body).unwrap_or_default();
    let ids: Option<Vec<u64>> = fields.iter().map(|f| f.parse().ok()).collect();
    match ids.as_deref() {
        Some([fid, aid, eid, gid, ..]) => Outcome::Success(Payload::File(FileInfo {
            fid: *fid,
            aid: *aid,
            eid: *eid,
            gid: *gid,
        })),
        _ => Outcome::transient("malformed FILE reply"),
    }
}

fn parse_anime(body: &str) -> Outcome {
    let fields = codec::first_record(body).unwrap_or_default();
    match fields.as_slice() {
        [aid, year, kind, romaji, ..] => match aid.parse() {
            Ok(aid) => Outcome::Success(Payload::Anime(AnimeInfo {
                aid,
                year: year.to_string(),
                kind: kind.to_string(),
                romaji_name: romaji.to_string(),
            })),
            Err(_) => Outcome::transient("malformed ANIME reply"),
        },
        _ => Outcome::transient("malformed ANIME reply"),
    }
}

fn parse_episode(body: &str) -> Outcome {
    let fields = codec::first_record(body).unwrap_or_default();
    let [eid, aid, length, _rating, _votes, number, english, romaji, ..] = fields.as_slice() else {
        return Outcome::transient("malformed EPISODE reply");
    };

    match (eid.parse(), aid.parse(), length.parse()) {
        (Ok(eid), Ok(aid), Ok(length)) => Outcome::Success(Payload::Episode(EpisodeInfo {
            eid,
            aid,
            length,
            number: number.to_string(),
            english_name: english.to_string(),
            romaji_name: romaji.to_string(),
        })),
        _ => Outcome::transient("malformed EPISODE reply"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789ABCDEF0123456789abcdef";

    #[test]
    fn test_file_ref_validation() {
        assert!(FileRef::by_id(0).is_err());
        assert!(FileRef::by_hash("abc", 10).is_err());
        assert!(FileRef::by_hash("z".repeat(32), 10).is_err());
        assert!(FileRef::by_hash(HASH, 0).is_err());

        let file = FileRef::by_hash(HASH, 10).unwrap();
        assert_eq!(
            file,
            FileRef::Hash {
                ed2k: HASH.to_ascii_lowercase(),
                size: 10
            }
        );
    }

    #[test]
    fn test_id_validation() {
        assert!(matches!(
            Command::get_anime_info(0),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(Command::get_episode_info(0).is_err());
        assert!(Command::get_episode_info(5).is_ok());
    }

    #[test]
    fn test_mark_file_as_disk() {
        let by_id = Command::mark_file_as_disk(FileRef::by_id(42).unwrap());
        assert_eq!(by_id.render(), "MYLISTADD fid=42&state=2&edit=1");
        assert_eq!(by_id.dedup_key(), "MarkFileAsDisk_F42");
        assert_eq!(by_id.activity(), ActivityKind::MarkingFileExternal);

        let by_hash = Command::mark_file_as_disk(FileRef::by_hash(HASH, 734003200).unwrap());
        assert_eq!(
            by_hash.render(),
            "MYLISTADD size=734003200&ed2k=0123456789abcdef0123456789abcdef&state=2&edit=1"
        );
        assert_eq!(by_hash.dedup_key(), "MarkFileAsDisk_0123456789abcdef0123456789abcdef");

        for code in [210, 310, 311] {
            assert_eq!(by_id.parse_outcome(code, "OK"), Outcome::Success(Payload::Ack));
        }
        for code in [320, 411] {
            assert_eq!(by_id.parse_outcome(code, "NO SUCH"), Outcome::NotFound);
        }
    }

    #[test]
    fn test_shared_codes_apply_to_every_command() {
        let file = FileRef::by_id(1).unwrap();
        let commands = [
            Command::mark_file_as_disk(file.clone()),
            Command::add_file_to_mylist(file.clone(), MyListState::Internal, false),
            Command::update_file_watched(file.clone(), true),
            Command::remove_file_from_mylist(file.clone()),
            Command::get_file_info(file),
            Command::get_anime_info(1).unwrap(),
            Command::get_episode_info(1).unwrap(),
        ];

        for command in &commands {
            assert_eq!(
                command.parse_outcome(555, "BANNED\nflood"),
                Outcome::Banned {
                    reason: Some("flood".to_string())
                },
                "{}",
                command
            );
            assert_eq!(command.parse_outcome(598, "UNKNOWN COMMAND"), Outcome::UnknownCommand);
            assert_eq!(command.parse_outcome(501, "LOGIN FIRST"), Outcome::LoginRequired);
            assert_eq!(command.parse_outcome(502, "ACCESS DENIED"), Outcome::LoginFailed);
            assert!(matches!(
                command.parse_outcome(604, "TIMEOUT"),
                Outcome::TransientFailure { .. }
            ));
            assert!(matches!(
                command.parse_outcome(123, "WHAT"),
                Outcome::TransientFailure { .. }
            ));
        }
    }

    #[test]
    fn test_add_file_to_mylist() {
        let command = Command::add_file_to_mylist(FileRef::by_id(7).unwrap(), MyListState::Internal, true);
        assert_eq!(command.render(), "MYLISTADD fid=7&state=1&viewed=1");
        assert_eq!(command.activity(), ActivityKind::AddingFileToMyList);

        assert_eq!(
            command.parse_outcome(210, "MYLIST ENTRY ADDED\n5551234"),
            Outcome::Success(Payload::MyListEntry {
                lid: Some(5551234),
                already_listed: false
            })
        );
        assert_eq!(
            command.parse_outcome(310, "FILE ALREADY IN MYLIST\n99|7|1|2|3"),
            Outcome::Success(Payload::MyListEntry {
                lid: Some(99),
                already_listed: true
            })
        );
        assert!(matches!(
            command.parse_outcome(210, "MYLIST ENTRY ADDED"),
            Outcome::TransientFailure { .. }
        ));
        for code in [320, 330, 350] {
            assert_eq!(command.parse_outcome(code, ""), Outcome::NotFound);
        }
    }

    #[test]
    fn test_update_and_remove() {
        let file = FileRef::by_id(7).unwrap();

        let watched = Command::update_file_watched(file.clone(), false);
        assert_eq!(watched.render(), "MYLISTADD fid=7&viewed=0&edit=1");
        assert_eq!(watched.dedup_key(), "UpdateFileWatched_F7_0");
        assert_eq!(watched.parse_outcome(311, "MYLIST ENTRY EDITED"), Outcome::Success(Payload::Ack));
        assert_eq!(watched.parse_outcome(411, "NO SUCH MYLIST ENTRY"), Outcome::NotFound);

        let remove = Command::remove_file_from_mylist(file);
        assert_eq!(remove.render(), "MYLISTDEL fid=7");
        assert_eq!(remove.parse_outcome(211, "MYLIST ENTRY DELETED\n1"), Outcome::Success(Payload::Ack));
        assert_eq!(remove.parse_outcome(411, "NO SUCH MYLIST ENTRY"), Outcome::NotFound);
    }

    #[test]
    fn test_get_file_info() {
        let command = Command::get_file_info(FileRef::by_id(312498).unwrap());
        assert_eq!(command.render(), "FILE fid=312498&fmask=70000000&amask=00000000");

        assert_eq!(
            command.parse_outcome(220, "FILE\n312498|4688|69260|4243"),
            Outcome::Success(Payload::File(FileInfo {
                fid: 312498,
                aid: 4688,
                eid: 69260,
                gid: 4243
            }))
        );
        assert!(matches!(
            command.parse_outcome(220, "FILE\n312498|x|69260|4243"),
            Outcome::TransientFailure { .. }
        ));
        assert_eq!(command.parse_outcome(320, "NO SUCH FILE"), Outcome::NotFound);
        assert!(matches!(
            command.parse_outcome(322, "MULTIPLE FILES FOUND"),
            Outcome::TransientFailure { .. }
        ));
    }

    #[test]
    fn test_get_anime_and_episode_info() {
        let anime = Command::get_anime_info(1).unwrap();
        assert_eq!(anime.render(), "ANIME aid=1&amask=b0800000");
        assert_eq!(
            anime.parse_outcome(230, "ANIME\n1|1999-1999|TV Series|Seikai no Monshou"),
            Outcome::Success(Payload::Anime(AnimeInfo {
                aid: 1,
                year: "1999-1999".to_string(),
                kind: "TV Series".to_string(),
                romaji_name: "Seikai no Monshou".to_string()
            }))
        );
        assert_eq!(anime.parse_outcome(330, "NO SUCH ANIME"), Outcome::NotFound);
        assert!(matches!(
            anime.parse_outcome(230, "ANIME"),
            Outcome::TransientFailure { .. }
        ));

        let episode = Command::get_episode_info(2).unwrap();
        assert_eq!(episode.render(), "EPISODE eid=2");
        assert_eq!(
            episode.parse_outcome(240, "EPISODE\n2|1|25|712|14|02|Kin of the Stars|Hoshi no Ichizoku|星の一族|1295059229"),
            Outcome::Success(Payload::Episode(EpisodeInfo {
                eid: 2,
                aid: 1,
                length: 25,
                number: "02".to_string(),
                english_name: "Kin of the Stars".to_string(),
                romaji_name: "Hoshi no Ichizoku".to_string()
            }))
        );
        assert_eq!(episode.parse_outcome(340, "NO SUCH EPISODE"), Outcome::NotFound);
    }
}

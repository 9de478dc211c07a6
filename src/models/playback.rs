// PlaylistPlayback Model
// Sequencer state for a playlist-backed session

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Reference to one playlist video, as the remote API describes it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRef {
    pub id: i64,
    pub nome: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duracao: Option<i64>,
}

/// Result of computing the next playback index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Playback moves to this index
    Moved(usize),
    /// End of a non-looping playlist; the session should stop
    Ended,
}

/// Playback state for an active playlist session.
///
/// The video sequence is fixed for the life of the session. When shuffle is
/// requested it is applied once at construction; loop wrap-around replays
/// the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistPlayback {
    pub playlist_id: i64,

    /// Playlist display name
    pub name: String,

    /// Ordered (possibly pre-shuffled) video sequence, never empty
    pub videos: Vec<VideoRef>,

    /// Always a valid index into `videos`
    pub current_index: usize,

    pub is_playing: bool,

    /// Wrap to the first video after the last one
    pub looping: bool,

    /// Whether the sequence was shuffled at construction
    pub shuffle: bool,
}

impl PlaylistPlayback {
    /// Build playback state for a freshly started session.
    /// `videos` must be non-empty; the caller validates that before starting.
    pub fn new(
        playlist_id: i64,
        name: String,
        mut videos: Vec<VideoRef>,
        looping: bool,
        shuffle: bool,
    ) -> Self {
        if shuffle {
            videos.shuffle(&mut rand::thread_rng());
        }
        Self {
            playlist_id,
            name,
            videos,
            current_index: 0,
            is_playing: true,
            looping,
            shuffle,
        }
    }

    /// The video currently playing
    pub fn current_video(&self) -> &VideoRef {
        &self.videos[self.current_index]
    }

    /// Compute the index after the current one.
    /// Wraps when looping; reports `Ended` at the end of a non-looping list.
    pub fn advance_index(&self) -> Advance {
        let next = self.current_index + 1;
        if next < self.videos.len() {
            Advance::Moved(next)
        } else if self.looping {
            Advance::Moved(0)
        } else {
            Advance::Ended
        }
    }

    /// Compute the index before the current one.
    /// Always wraps from 0 to the last video, regardless of `looping`.
    pub fn retreat_index(&self) -> usize {
        if self.current_index == 0 {
            self.videos.len() - 1
        } else {
            self.current_index - 1
        }
    }

    /// Whether `index` is addressable in this sequence
    pub fn is_valid_index(&self, index: usize) -> bool {
        index < self.videos.len()
    }
}

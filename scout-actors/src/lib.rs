//! Actor runtime, persistence, capture control and request routing.
//!
//! The [`router::Router`] is the hub: front ends send it JSON envelopes
//! (directly or through the [`router::RouterActor`] mailbox) and it fans out
//! to the [`capture::CaptureController`], the [`store::ScoutStore`] and a
//! [`scout_llm::Analyzer`].
pub mod actor;
pub mod capture;
pub mod router;
pub mod store;

pub use capture::{Capture, CaptureController};
pub use router::{ask, Request, Response, ResponseBody, Router, RouterActor, RouterMsg};
pub use store::{
    AnalysisRecord, HistoryEntry, KvStore, MemoryStore, Preferences, ScoutStore, SqliteStore,
    StoreError,
};

//! Service modules for catalog deduplication and enrichment

pub mod artist_merger;
pub mod batch_runner;
pub mod duplicate_detector;
pub mod merge_strategy;
pub mod musicbrainz_client;
pub mod name_normalizer;
pub mod sources;
pub mod sync_orchestrator;
pub mod tmdb_client;

pub use artist_merger::{ArtistMerger, MergeReport, RelationMove};
pub use batch_runner::{run_batch, BatchFailure, BatchReport, SyncOutcome};
pub use duplicate_detector::{
    detect_duplicates, ArtistCandidate, DuplicateDetector, DuplicateGroup, DuplicateReport,
    MatchConfidence, MatchReason,
};
pub use merge_strategy::{reconcile, ReconcilePlan, Reconcilable};
pub use musicbrainz_client::MusicBrainzClient;
pub use sources::{
    CastEntry, CastSource, CreditEntry, DiscographySource, FilmographySource, ReleaseEntry,
    SocialLink, SocialLinkSource, SourceError, Sources,
};
pub use sync_orchestrator::{SyncError, SyncOrchestrator, SyncRequest};
pub use tmdb_client::TmdbClient;

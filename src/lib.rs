//! # Blogsmith
//!
//! Incremental publishing engine for a markdown personal blog. A git
//! checkout of markdown documents is the data source; the published output
//! is plain HTML pages, RSS feeds, and paginated indexes.
//!
//! # Architecture: Incremental Regeneration
//!
//! The engine's job is to keep several independently-persisted derived
//! indexes — per-tag feeds, a capped public feed, an uncapped archive feed,
//! paginated HTML — consistent with an arbitrarily-changing source set,
//! without reprocessing the whole corpus on every run:
//!
//! ```text
//! changed paths ──→ classify ──→ render pages / copy media
//!       │                            │
//!       │                            ├──→ tag index (touched tags)
//!       │                            └──→ publication registry
//!       └── deletions ──→ doomed outputs + retired GUIDs
//!                                     │
//!                         rewrite touched tag chunks + HTML
//!                         rebuild master feeds, index, homepage snippet
//! ```
//!
//! Two run modes share that pipeline. An **incremental run** diffs against
//! the upstream head and rewrites only what the diff touches, in place. A
//! **full rebuild** walks the whole tree into a fresh timestamp-named
//! generation directory and atomically repoints the live symlink when — and
//! only when — the build succeeds, so readers never observe a half-built
//! site.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`changeset`] | Turns a tree walk or `--name-status` diff into classified path lists |
//! | [`classify`] | Routes each path to content/media/unknown handling; magic-byte sniffing |
//! | [`frontmatter`] | YAML front matter → [`frontmatter::ContentDocument`]; slugs and permalinks |
//! | [`renderer`] | `PageRenderer` seam + the maud/pulldown-cmark implementation |
//! | [`feed`] | RSS 2.0 read/write contract shared by every persisted index |
//! | [`tags`] | Touched-tag accumulation and chunked read-merge-rewrite |
//! | [`registry`] | Canonical published-item map; master feeds and homepage snippet |
//! | [`paginate`] | Fixed-size pages with cross-page date-range navigation |
//! | [`swap`] | Generation directories and the atomic pointer swap |
//! | [`update`] | The orchestrator: full and incremental runs, error aggregation |
//! | [`vcs`] | `VersionControl` seam + the `git` subprocess implementation |
//! | [`syndicate`] | Crosspost dispatch and pending-marker write-back |
//! | [`config`] | `blog.toml` loading and validation |
//! | [`output`] | Progress marks and the totals line |
//!
//! # Design Decisions
//!
//! ## Feeds Are the Database
//!
//! There is no state store beyond the published artifacts themselves. The
//! uncapped archive feed *is* the publication registry's persistent form;
//! incremental runs reload it, apply the change set, and write it back.
//! Tag feeds likewise are read whole, merged by GUID, and rewritten whole —
//! acceptable for a personal corpus, and it means any state corruption is
//! fixed by a full rebuild.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/), so templates
//! are compile-time checked, interpolation is escaped by default, and there
//! is no template directory to ship or get out of sync.
//!
//! ## Best-Effort Runs
//!
//! One malformed document should not hold the rest of the blog hostage.
//! Per-path failures are collected into the run report while the run
//! publishes everything that succeeded; the process exits non-zero so a
//! scheduler still notices. Only configuration, version-control, and
//! build-phase failures abort a run.

pub mod changeset;
pub mod classify;
pub mod config;
pub mod feed;
pub mod frontmatter;
pub mod output;
pub mod paginate;
pub mod registry;
pub mod renderer;
pub mod swap;
pub mod syndicate;
pub mod tags;
pub mod update;
pub mod vcs;

//! Materialized ranking index.
//!
//! Recomputing scores for every video on every read is the
//! correctness-preserving baseline; this index instead serves an
//! approximate top-K from a periodically refreshed materialization (the
//! sanctioned staleness window, default 5s). Readers clone the current
//! `Arc<Materialization>`, so a page is internally consistent within one
//! epoch and may shift slightly relative to the next epoch's page.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{RankedVideo, VideoStats};
use crate::services::scoring::{ScoringPolicy, VIRAL_LISTING_THRESHOLD};
use crate::services::stats_store::StatsStore;

/// Sort key for hashtag listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashtagSort {
    Views,
    Likes,
    Recent,
}

/// One refresh epoch's worth of orderings.
#[derive(Debug)]
pub struct Materialization {
    pub epoch: u64,
    pub refreshed_at: DateTime<Utc>,
    global: Vec<RankedVideo>,
    viral: Vec<RankedVideo>,
    by_category: HashMap<String, Vec<RankedVideo>>,
}

impl Materialization {
    fn empty() -> Self {
        Self {
            epoch: 0,
            refreshed_at: Utc::now(),
            global: Vec::new(),
            viral: Vec::new(),
            by_category: HashMap::new(),
        }
    }

    /// Global ordering by trending score, newest-first on ties.
    pub fn top_k(&self, limit: usize, skip: usize) -> Vec<RankedVideo> {
        page(&self.global, limit, skip)
    }

    /// Videos at or above the viral threshold, by viral score.
    pub fn viral_top_k(&self, limit: usize, skip: usize) -> Vec<RankedVideo> {
        page(&self.viral, limit, skip)
    }

    pub fn category_top_k(&self, category: &str, limit: usize, skip: usize) -> Vec<RankedVideo> {
        self.by_category
            .get(category)
            .map(|entries| page(entries, limit, skip))
            .unwrap_or_default()
    }

    pub fn category(&self, category: &str) -> &[RankedVideo] {
        self.by_category
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn global(&self) -> &[RankedVideo] {
        &self.global
    }

    /// Filter the global ordering by hashtag and re-sort by the requested
    /// key. No text relevance here; hashtag membership is exact.
    pub fn hashtag_top_k(
        &self,
        hashtag: &str,
        sort: HashtagSort,
        limit: usize,
        skip: usize,
    ) -> Vec<RankedVideo> {
        let mut matches: Vec<RankedVideo> = self
            .global
            .iter()
            .filter(|v| v.hashtags.iter().any(|tag| tag == hashtag))
            .cloned()
            .collect();
        match sort {
            HashtagSort::Views => matches.sort_by(|a, b| b.views.cmp(&a.views)),
            HashtagSort::Likes => matches.sort_by(|a, b| b.likes.cmp(&a.likes)),
            HashtagSort::Recent => matches.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
        }
        page(&matches, limit, skip)
    }

    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub epoch: u64,
    pub entries: usize,
    pub duration: Duration,
}

pub struct RankingIndex {
    policy: ScoringPolicy,
    current: RwLock<Arc<Materialization>>,
    epoch: AtomicU64,
    /// Videos removed (deleted or unapproved). Terminal for an id; a
    /// re-approved video re-enters through the publish hook.
    suppressed: DashSet<Uuid>,
}

impl RankingIndex {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            current: RwLock::new(Arc::new(Materialization::empty())),
            epoch: AtomicU64::new(0),
            suppressed: DashSet::new(),
        }
    }

    /// The latest materialization. Never blocks on a refresh in progress
    /// beyond the brief pointer swap; always returns the last-good epoch.
    pub fn current(&self) -> Arc<Materialization> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuild all orderings from store snapshots. Reads one snapshot at a
    /// time, holding no per-video lock across the sweep: the result mixes
    /// values from slightly different moments (eventual consistency across
    /// the ranking, strict consistency within each video's counters).
    pub fn refresh(&self, stats: &StatsStore, now: DateTime<Utc>) -> Result<RefreshSummary> {
        let started = Instant::now();

        let mut global: Vec<RankedVideo> = stats
            .snapshots()
            .into_iter()
            .filter(|snapshot| !self.suppressed.contains(&snapshot.video_id))
            .map(|snapshot| self.rank(&snapshot, now))
            .collect();
        global.sort_by(cmp_trending);

        let mut viral: Vec<RankedVideo> = global
            .iter()
            .filter(|v| v.viral_score >= VIRAL_LISTING_THRESHOLD)
            .cloned()
            .collect();
        viral.sort_by(cmp_viral);

        let mut by_category: HashMap<String, Vec<RankedVideo>> = HashMap::new();
        for video in &global {
            by_category
                .entry(video.category.clone())
                .or_default()
                .push(video.clone());
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let entries = global.len();
        let next = Arc::new(Materialization {
            epoch,
            refreshed_at: now,
            global,
            viral,
            by_category,
        });

        let mut current = self
            .current
            .write()
            .map_err(|_| AppError::Internal("ranking index lock poisoned".to_string()))?;
        *current = next;
        drop(current);

        Ok(RefreshSummary {
            epoch,
            entries,
            duration: started.elapsed(),
        })
    }

    /// Purge a video (deleted or unapproved) from the current
    /// materialization and all future refreshes, without a rebuild.
    pub fn remove(&self, video_id: Uuid) {
        self.suppressed.insert(video_id);
        self.mutate_current(|m| {
            m.global.retain(|v| v.video_id != video_id);
            m.viral.retain(|v| v.video_id != video_id);
            for entries in m.by_category.values_mut() {
                entries.retain(|v| v.video_id != video_id);
            }
        });
    }

    /// Move a video between category orderings in bounded time. The next
    /// refresh picks the new category up from the stats record itself.
    pub fn upsert_category(&self, video_id: Uuid, category: &str) {
        self.mutate_current(|m| {
            let mut moved: Option<RankedVideo> = None;
            for entries in m.by_category.values_mut() {
                if let Some(pos) = entries.iter().position(|v| v.video_id == video_id) {
                    moved = Some(entries.remove(pos));
                    break;
                }
            }
            let mut entry = match moved {
                Some(entry) => entry,
                None => match m.global.iter().find(|v| v.video_id == video_id) {
                    Some(entry) => entry.clone(),
                    None => return,
                },
            };
            entry.category = category.to_string();
            if let Some(global_entry) = m.global.iter_mut().find(|v| v.video_id == video_id) {
                global_entry.category = category.to_string();
            }

            let entries = m.by_category.entry(category.to_string()).or_default();
            let at = entries
                .binary_search_by(|probe| cmp_trending(probe, &entry))
                .unwrap_or_else(|i| i);
            entries.insert(at, entry);
        });
    }

    fn rank(&self, snapshot: &VideoStats, now: DateTime<Utc>) -> RankedVideo {
        let scores = self.policy.score(snapshot, now);
        RankedVideo {
            video_id: snapshot.video_id,
            creator_id: snapshot.creator_id,
            category: snapshot.category.clone(),
            hashtags: snapshot.hashtags.clone(),
            published_at: snapshot.published_at,
            views: snapshot.views,
            likes: snapshot.likes,
            comments: snapshot.comments,
            shares: snapshot.shares,
            trending_score: scores.trending,
            viral_score: scores.viral,
        }
    }

    /// Clone-modify-swap the current materialization under a new epoch.
    fn mutate_current(&self, mutate: impl FnOnce(&mut Materialization)) {
        let snapshot = self.current();
        let mut next = Materialization {
            epoch: self.epoch.fetch_add(1, Ordering::SeqCst) + 1,
            refreshed_at: snapshot.refreshed_at,
            global: snapshot.global.clone(),
            viral: snapshot.viral.clone(),
            by_category: snapshot.by_category.clone(),
        };
        mutate(&mut next);

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(next);
    }
}

fn page(entries: &[RankedVideo], limit: usize, skip: usize) -> Vec<RankedVideo> {
    entries.iter().skip(skip).take(limit).cloned().collect()
}

/// Trending score descending, more recently published first on ties.
fn cmp_trending(a: &RankedVideo, b: &RankedVideo) -> std::cmp::Ordering {
    b.trending_score
        .partial_cmp(&a.trending_score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.published_at.cmp(&a.published_at))
}

fn cmp_viral(a: &RankedVideo, b: &RankedVideo) -> std::cmp::Ordering {
    b.viral_score
        .partial_cmp(&a.viral_score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.published_at.cmp(&a.published_at))
}

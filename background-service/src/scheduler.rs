//! Timed automation, one state machine per action kind.
//!
//! Each [`ActionScheduler`] owns a spawned loop: warm-up, then one tick per
//! interval, each tick preceded by a random natural delay. Stopping flips a
//! watch channel; the loop never starts another tick once it sees the flag,
//! but a tick already in flight is allowed to finish.

use crate::activity::ActivityLog;
use crate::ports::{ContentSource, RedditActions};
use chrono::{DateTime, Utc};
use redscribe_core::{
    ActionKind, ActionRecord, AnalyticsCounters, AutomationPolicy, AutomationTargets, Clock,
    CoreError, ErrorExt, RedditPost,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub const COMMENT_LISTING_LIMIT: u32 = 50;
pub const NOT_AUTHENTICATED: &str = "NOT_AUTHENTICATED";
pub const NO_SUITABLE_POST: &str = "NO_SUITABLE_POST";

const MIN_UPVOTES: i64 = 10;
const MAX_POST_AGE_HOURS: i64 = 24;
const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    CapReached { count: u32, cap: u32 },
    NoTargets,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Recorded(ActionRecord),
    Skipped(SkipReason),
}

/// Collaborators shared by both schedulers.
#[derive(Clone)]
pub struct AutomationContext {
    pub reddit: Arc<dyn RedditActions>,
    pub content: Arc<dyn ContentSource>,
    pub activity: Arc<ActivityLog>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutomationStatus {
    pub posts: SchedulerState,
    pub comments: SchedulerState,
    pub counters: AnalyticsCounters,
}

/// A comment target must have traction, be open, and be recent.
pub fn is_suitable_post(post: &RedditPost, now: DateTime<Utc>) -> bool {
    post.ups >= MIN_UPVOTES
        && !post.stickied
        && !post.locked
        && post
            .created_at()
            .is_some_and(|created| now - created < chrono::Duration::hours(MAX_POST_AGE_HOURS))
}

struct TickRunner {
    kind: ActionKind,
    ctx: AutomationContext,
    policy: AutomationPolicy,
    targets: Arc<RwLock<AutomationTargets>>,
    in_flight: AtomicBool,
    rng: std::sync::Mutex<fastrand::Rng>,
}

/// Clears the in-flight flag when a tick ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TickRunner {
    fn with_rng<T>(&self, f: impl FnOnce(&mut fastrand::Rng) -> T) -> T {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }

    fn pick<T: Clone>(&self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            return None;
        }
        let index = self.with_rng(|rng| rng.usize(..items.len()));
        items.get(index).cloned()
    }

    fn natural_delay(&self) -> Duration {
        let (min, max) = self.policy.natural_delay_range();
        if max <= min {
            return min;
        }
        let millis =
            self.with_rng(|rng| rng.u64(min.as_millis() as u64..=max.as_millis() as u64));
        Duration::from_millis(millis)
    }

    fn estimated_karma(&self) -> i64 {
        match self.kind {
            ActionKind::Post => self.with_rng(|rng| rng.i64(10..60)),
            ActionKind::Comment => self.with_rng(|rng| rng.i64(5..25)),
        }
    }

    async fn tick(&self) -> TickOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!(kind = %self.kind, "Previous tick still running, skipping");
            return TickOutcome::Skipped(SkipReason::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let outcome = self.execute().await;
        match &outcome {
            TickOutcome::Recorded(record) if record.is_success() => {
                info!(kind = %self.kind, subreddit = ?record.subreddit, "Automation tick succeeded");
            }
            TickOutcome::Recorded(record) => {
                warn!(kind = %self.kind, outcome = ?record.outcome, "Automation tick failed");
            }
            TickOutcome::Skipped(reason) => {
                debug!(kind = %self.kind, ?reason, "Automation tick skipped");
            }
        }
        outcome
    }

    async fn execute(&self) -> TickOutcome {
        let now = self.ctx.clock.now();
        let cap = self.policy.cap(self.kind);
        let since = now - self.policy.cap_window(self.kind);
        let count = self.ctx.activity.count_successes(self.kind, since).await;
        if count >= cap {
            info!(kind = %self.kind, count, cap, "Action cap reached, skipping tick");
            return TickOutcome::Skipped(SkipReason::CapReached { count, cap });
        }

        if !self.ctx.reddit.is_authenticated().await {
            warn!(kind = %self.kind, "Not authenticated, skipping tick");
            return self
                .finish(ActionRecord::failure(
                    self.kind,
                    None,
                    NOT_AUTHENTICATED,
                    "Not authenticated with Reddit",
                    now,
                ))
                .await;
        }

        let targets = self.targets.read().await.clone();
        match self.kind {
            ActionKind::Post => self.post(&targets).await,
            ActionKind::Comment => self.comment(&targets).await,
        }
    }

    async fn post(&self, targets: &AutomationTargets) -> TickOutcome {
        let (Some(subreddit), Some(topic)) = (
            self.pick(&targets.post_subreddits),
            self.pick(&targets.post_topics),
        ) else {
            warn!("No post subreddits or topics configured");
            return TickOutcome::Skipped(SkipReason::NoTargets);
        };

        let draft = match self
            .ctx
            .content
            .draft_post(&subreddit, &topic, &targets.post_style)
            .await
        {
            Ok(draft) => draft,
            Err(e) => return self.fail(subreddit, &e).await,
        };

        if let Err(e) = self
            .ctx
            .reddit
            .submit_post(&subreddit, &draft.title, &draft.body)
            .await
        {
            return self.fail(subreddit, &e).await;
        }

        let karma = self.estimated_karma();
        self.finish(ActionRecord::success(
            ActionKind::Post,
            subreddit,
            draft.title,
            karma,
            self.ctx.clock.now(),
        ))
        .await
    }

    async fn comment(&self, targets: &AutomationTargets) -> TickOutcome {
        let (Some(subreddit), Some(tone)) = (
            self.pick(&targets.comment_subreddits),
            self.pick(&targets.comment_tones),
        ) else {
            warn!("No comment subreddits or tones configured");
            return TickOutcome::Skipped(SkipReason::NoTargets);
        };

        let posts = match self
            .ctx
            .reddit
            .list_posts(&subreddit, targets.comment_sort, COMMENT_LISTING_LIMIT)
            .await
        {
            Ok(posts) => posts,
            Err(e) => return self.fail(subreddit, &e).await,
        };

        let now = self.ctx.clock.now();
        let candidates: Vec<&RedditPost> = posts
            .iter()
            .filter(|post| is_suitable_post(post, now))
            .collect();
        let Some(post) = self.pick(&candidates) else {
            warn!(subreddit = %subreddit, listed = posts.len(), "No suitable post to comment on");
            let message = format!("No suitable post found in r/{}", subreddit);
            return self
                .finish(ActionRecord::failure(
                    ActionKind::Comment,
                    Some(subreddit),
                    NO_SUITABLE_POST,
                    message,
                    now,
                ))
                .await;
        };

        let text = match self
            .ctx
            .content
            .draft_comment(&post.title, &post.selftext, &tone)
            .await
        {
            Ok(text) => text,
            Err(e) => return self.fail(subreddit, &e).await,
        };

        if let Err(e) = self.ctx.reddit.submit_comment(&post.name, &text).await {
            return self.fail(subreddit, &e).await;
        }

        let karma = self.estimated_karma();
        self.finish(ActionRecord::success(
            ActionKind::Comment,
            subreddit,
            post.title.clone(),
            karma,
            self.ctx.clock.now(),
        ))
        .await
    }

    async fn fail(&self, subreddit: String, error: &CoreError) -> TickOutcome {
        error.log_error();
        self.finish(ActionRecord::failure(
            self.kind,
            Some(subreddit),
            error.error_code(),
            error.user_friendly_message(),
            self.ctx.clock.now(),
        ))
        .await
    }

    async fn finish(&self, record: ActionRecord) -> TickOutcome {
        if let Err(e) = self.ctx.activity.record(record.clone()).await {
            e.log_error();
        }
        TickOutcome::Recorded(record)
    }
}

/// Sleeps for `duration` unless stopped first. Returns whether to go on.
async fn pause(stop: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *stop.borrow() {
        return false;
    }
    tokio::select! {
        biased;
        _ = stop.changed() => false,
        _ = time::sleep(duration) => !*stop.borrow(),
    }
}

async fn run_loop(runner: Arc<TickRunner>, mut stop: watch::Receiver<bool>) {
    let kind = runner.kind;

    if !pause(&mut stop, runner.policy.warmup(kind)).await {
        debug!(%kind, "Stopped during warm-up");
        return;
    }

    let mut ticker = time::interval(runner.policy.interval(kind).max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = ticker.tick() => {}
        }

        let delay = runner.natural_delay();
        debug!(%kind, delay_ms = delay.as_millis() as u64, "Natural delay before tick");
        if !pause(&mut stop, delay).await {
            break;
        }

        runner.tick().await;
    }

    debug!(%kind, "Scheduler loop exited");
}

struct RunHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct ActionScheduler {
    runner: Arc<TickRunner>,
    control: Mutex<Option<RunHandle>>,
}

impl ActionScheduler {
    fn new(
        kind: ActionKind,
        ctx: AutomationContext,
        policy: AutomationPolicy,
        targets: Arc<RwLock<AutomationTargets>>,
        rng: fastrand::Rng,
    ) -> Self {
        Self {
            runner: Arc::new(TickRunner {
                kind,
                ctx,
                policy,
                targets,
                in_flight: AtomicBool::new(false),
                rng: std::sync::Mutex::new(rng),
            }),
            control: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.runner.kind
    }

    pub async fn state(&self) -> SchedulerState {
        if self.control.lock().await.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Stopped → Running. Returns false when already running.
    pub async fn start(&self) -> bool {
        let mut control = self.control.lock().await;
        if control.is_some() {
            debug!(kind = %self.kind(), "Scheduler already running");
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self.runner.clone(), stop_rx));
        *control = Some(RunHandle { stop, task });

        info!(
            kind = %self.kind(),
            warmup_secs = self.runner.policy.warmup(self.kind()).as_secs(),
            interval_secs = self.runner.policy.interval(self.kind()).as_secs(),
            "Scheduler started"
        );
        true
    }

    /// Running → Stopped. No new tick starts once this returns; a tick
    /// already in flight finishes in the background. Returns false when
    /// already stopped.
    pub async fn stop(&self) -> bool {
        match self.control.lock().await.take() {
            Some(handle) => {
                // The loop may already be gone
                let _ = handle.stop.send(true);
                info!(kind = %self.kind(), "Scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Like [`stop`](Self::stop), then waits for an in-flight tick to end.
    pub async fn stop_and_wait(&self) {
        let handle = self.control.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.stop.send(true);
            if let Err(e) = handle.task.await {
                error!(kind = %self.kind(), error = %e, "Scheduler task ended abnormally");
            }
            info!(kind = %self.kind(), "Scheduler stopped");
        }
    }

    /// One tick now, skipping warm-up and natural delay. Respects the
    /// in-flight guard and works whether or not the timer is running.
    pub async fn run_now(&self) -> TickOutcome {
        self.runner.tick().await
    }
}

/// The post and comment schedulers over shared targets and activity.
pub struct AutomationScheduler {
    posts: ActionScheduler,
    comments: ActionScheduler,
    targets: Arc<RwLock<AutomationTargets>>,
    activity: Arc<ActivityLog>,
}

impl AutomationScheduler {
    pub fn new(
        ctx: AutomationContext,
        policy: AutomationPolicy,
        targets: AutomationTargets,
    ) -> Self {
        Self::build(ctx, policy, targets, fastrand::Rng::new(), fastrand::Rng::new())
    }

    /// Deterministic target picks, delays and karma estimates.
    pub fn with_seed(
        ctx: AutomationContext,
        policy: AutomationPolicy,
        targets: AutomationTargets,
        seed: u64,
    ) -> Self {
        Self::build(
            ctx,
            policy,
            targets,
            fastrand::Rng::with_seed(seed),
            fastrand::Rng::with_seed(seed.wrapping_add(1)),
        )
    }

    fn build(
        ctx: AutomationContext,
        policy: AutomationPolicy,
        targets: AutomationTargets,
        post_rng: fastrand::Rng,
        comment_rng: fastrand::Rng,
    ) -> Self {
        let targets = Arc::new(RwLock::new(targets));
        let activity = ctx.activity.clone();
        Self {
            posts: ActionScheduler::new(
                ActionKind::Post,
                ctx.clone(),
                policy.clone(),
                targets.clone(),
                post_rng,
            ),
            comments: ActionScheduler::new(
                ActionKind::Comment,
                ctx,
                policy,
                targets.clone(),
                comment_rng,
            ),
            targets,
            activity,
        }
    }

    pub fn scheduler(&self, kind: ActionKind) -> &ActionScheduler {
        match kind {
            ActionKind::Post => &self.posts,
            ActionKind::Comment => &self.comments,
        }
    }

    pub async fn start(&self, kind: ActionKind) -> bool {
        self.scheduler(kind).start().await
    }

    pub async fn stop(&self, kind: ActionKind) -> bool {
        self.scheduler(kind).stop().await
    }

    pub async fn stop_all(&self) {
        self.posts.stop_and_wait().await;
        self.comments.stop_and_wait().await;
    }

    pub async fn run_now(&self, kind: ActionKind) -> TickOutcome {
        self.scheduler(kind).run_now().await
    }

    pub async fn state(&self, kind: ActionKind) -> SchedulerState {
        self.scheduler(kind).state().await
    }

    /// Takes effect from the next tick of either scheduler.
    pub async fn update_targets(&self, targets: AutomationTargets) {
        *self.targets.write().await = targets;
        info!("Automation targets updated");
    }

    pub async fn targets(&self) -> AutomationTargets {
        self.targets.read().await.clone()
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    pub async fn status(&self) -> AutomationStatus {
        AutomationStatus {
            posts: self.posts.state().await,
            comments: self.comments.state().await,
            counters: self.activity.counters().await,
        }
    }
}

//! Speculative mirror of the item list.
//!
//! Every item moves through `Confirmed -> Pending -> Confirmed | RolledBack`.
//! A vote is applied locally as soon as it is issued and tagged with a
//! sequence number from a per-cache counter; responses are matched back by
//! that number, so a response that belongs to an older request than the
//! latest one on the same item never replaces what is on screen.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    client::ClientError,
    models::{CategoryFilter, MediaItemView, VoteDirection, VoteOutcome, VoteState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteSnapshot {
    pub vote_count: i32,
    pub user_vote: Option<VoteDirection>,
}

impl VoteSnapshot {
    fn of(item: &MediaItemView) -> Self {
        Self {
            vote_count: item.vote_count,
            user_vote: item.current_user_vote,
        }
    }

    fn write_to(self, item: &mut MediaItemView) {
        item.vote_count = self.vote_count;
        item.current_user_vote = self.user_vote;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Confirmed,
    Pending,
    RolledBack { error: String },
}

/// Handle for one issued vote; hand it back with the server's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTicket {
    pub media_id: Uuid,
    pub direction: VoteDirection,
    pub seq: u64,
    epoch: u64,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    seq: u64,
    /// What was displayed right before this request was applied.
    prior: VoteSnapshot,
    /// `confirmed_seq` of the item when `prior` was captured.
    prior_confirmed_seq: u64,
}

#[derive(Debug, Clone)]
struct CachedItem {
    view: MediaItemView,
    confirmed: VoteSnapshot,
    confirmed_seq: u64,
    in_flight: Vec<InFlight>,
    status: SyncStatus,
}

impl CachedItem {
    fn new(view: MediaItemView) -> Self {
        Self {
            confirmed: VoteSnapshot::of(&view),
            view,
            confirmed_seq: 0,
            in_flight: Vec::new(),
            status: SyncStatus::Confirmed,
        }
    }

    fn take_in_flight(&mut self, seq: u64) -> Option<(InFlight, bool)> {
        let pos = self.in_flight.iter().position(|f| f.seq == seq)?;
        let entry = self.in_flight.remove(pos);
        let superseded = self.in_flight.iter().any(|f| f.seq > seq);
        Some((entry, superseded))
    }

    fn settle_status(&mut self) {
        if !self.in_flight.is_empty() {
            self.status = SyncStatus::Pending;
        } else if !matches!(self.status, SyncStatus::RolledBack { .. }) {
            self.status = SyncStatus::Confirmed;
        }
    }
}

#[derive(Debug, Default)]
pub struct VoteCache {
    order: Vec<Uuid>,
    items: HashMap<Uuid, CachedItem>,
    next_seq: u64,
    epoch: u64,
}

impl VoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a freshly fetched list as the confirmed baseline.
    ///
    /// Tickets issued against the previous list are invalidated, their
    /// responses will be ignored.
    pub fn replace(&mut self, items: Vec<MediaItemView>) {
        self.epoch += 1;
        self.order = items.iter().map(|i| i.id).collect();
        self.items = items
            .into_iter()
            .map(|view| (view.id, CachedItem::new(view)))
            .collect();
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    pub fn item(&self, media_id: Uuid) -> Option<&MediaItemView> {
        self.items.get(&media_id).map(|i| &i.view)
    }

    pub fn status(&self, media_id: Uuid) -> Option<&SyncStatus> {
        self.items.get(&media_id).map(|i| &i.status)
    }

    /// Displayed items for `filter`, highest `vote_count` first.
    pub fn view(&self, filter: CategoryFilter) -> Vec<MediaItemView> {
        let mut items: Vec<MediaItemView> = self
            .order
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|i| filter.matches(i.view.category))
            .map(|i| i.view.clone())
            .collect();
        // Stable, so equal counts keep server order.
        items.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
        items
    }

    /// Applies `direction` on top of whatever is displayed now, including
    /// other votes on the same item still in flight.
    pub fn begin_vote(
        &mut self,
        media_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteTicket, ClientError> {
        let item = self
            .items
            .get_mut(&media_id)
            .ok_or(ClientError::UnknownItem(media_id))?;

        self.next_seq += 1;
        let seq = self.next_seq;
        let prior = VoteSnapshot::of(&item.view);

        let transition = VoteState::from_direction(prior.user_vote).apply(direction);
        VoteSnapshot {
            vote_count: prior.vote_count + transition.delta,
            user_vote: transition.to.direction(),
        }
        .write_to(&mut item.view);

        item.in_flight.push(InFlight {
            seq,
            prior,
            prior_confirmed_seq: item.confirmed_seq,
        });
        item.status = SyncStatus::Pending;

        Ok(VoteTicket {
            media_id,
            direction,
            seq,
            epoch: self.epoch,
        })
    }

    /// Records the server's answer. Returns whether the display changed.
    pub fn confirm(&mut self, ticket: &VoteTicket, outcome: &VoteOutcome) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        let Some(item) = self.items.get_mut(&ticket.media_id) else {
            return false;
        };
        let Some((_, superseded)) = item.take_in_flight(ticket.seq) else {
            return false;
        };

        let truth = VoteSnapshot {
            vote_count: outcome.vote_count,
            user_vote: outcome.user_vote,
        };
        if ticket.seq > item.confirmed_seq {
            item.confirmed = truth;
            item.confirmed_seq = ticket.seq;
        }

        // A newer request owns the display until it resolves.
        let applied = !superseded && ticket.seq >= item.confirmed_seq;
        if applied {
            truth.write_to(&mut item.view);
            item.status = SyncStatus::Confirmed;
        }
        item.settle_status();
        applied
    }

    /// Reverts the item to what it showed right before this request.
    ///
    /// When a newer request on the same item is still in flight the display
    /// stays as is; that request inherits the restore point instead, so that
    /// if it also fails both speculative changes are undone. A failure older
    /// than the last confirmed answer changes nothing. If an older request was
    /// confirmed after the restore point was taken, the item reverts to that
    /// confirmed server state instead.
    pub fn fail(&mut self, ticket: &VoteTicket, error: &ClientError) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        let Some(item) = self.items.get_mut(&ticket.media_id) else {
            return false;
        };
        let Some((entry, superseded)) = item.take_in_flight(ticket.seq) else {
            return false;
        };

        if ticket.seq < item.confirmed_seq {
            item.settle_status();
            return false;
        }

        if superseded {
            if let Some(next) = item.in_flight.iter_mut().find(|f| f.seq > ticket.seq) {
                next.prior = entry.prior;
                next.prior_confirmed_seq = entry.prior_confirmed_seq;
            }
            item.settle_status();
            return false;
        }

        let older_pending = item.in_flight.iter().any(|f| f.seq > item.confirmed_seq);
        let restore = if item.confirmed_seq > entry.prior_confirmed_seq && !older_pending {
            item.confirmed
        } else {
            entry.prior
        };
        restore.write_to(&mut item.view);
        item.status = SyncStatus::RolledBack {
            error: error.to_string(),
        };
        item.settle_status();
        true
    }

    /// Last confirmed server state for an item.
    pub fn confirmed(&self, media_id: Uuid) -> Option<VoteSnapshot> {
        self.items.get(&media_id).map(|i| i.confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn view(vote_count: i32, category: Category) -> MediaItemView {
        MediaItemView {
            id: Uuid::new_v4(),
            title: "item".to_string(),
            url: "https://example.com".to_string(),
            description: String::new(),
            category,
            image: None,
            vote_count,
            current_user_vote: None,
        }
    }

    fn outcome(delta: i32, vote_count: i32, user_vote: Option<VoteDirection>) -> VoteOutcome {
        VoteOutcome {
            accepted: true,
            delta,
            vote_count,
            user_vote,
        }
    }

    fn cache_with(items: Vec<MediaItemView>) -> VoteCache {
        let mut cache = VoteCache::new();
        cache.replace(items);
        cache
    }

    #[test]
    fn optimistic_up_then_confirm() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let ticket = cache.begin_vote(id, VoteDirection::Up).unwrap();
        assert_eq!(cache.item(id).unwrap().vote_count, 6);
        assert_eq!(cache.status(id), Some(&SyncStatus::Pending));

        assert!(cache.confirm(&ticket, &outcome(1, 6, Some(VoteDirection::Up))));
        assert_eq!(cache.status(id), Some(&SyncStatus::Confirmed));
        assert_eq!(
            cache.confirmed(id),
            Some(VoteSnapshot {
                vote_count: 6,
                user_vote: Some(VoteDirection::Up)
            })
        );
    }

    #[test]
    fn server_truth_replaces_speculation() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let ticket = cache.begin_vote(id, VoteDirection::Up).unwrap();
        // Someone else voted meanwhile.
        cache.confirm(&ticket, &outcome(1, 9, Some(VoteDirection::Up)));
        assert_eq!(cache.item(id).unwrap().vote_count, 9);
    }

    #[test]
    fn failure_rolls_back_only_that_item() {
        let a = view(5, Category::News);
        let b = view(3, Category::Blog);
        let (a_id, b_id) = (a.id, b.id);
        let mut cache = cache_with(vec![a, b]);

        let b_ticket = cache.begin_vote(b_id, VoteDirection::Down).unwrap();
        let a_ticket = cache.begin_vote(a_id, VoteDirection::Up).unwrap();
        assert!(cache.fail(&a_ticket, &ClientError::Unauthorized));

        let a = cache.item(a_id).unwrap();
        assert_eq!((a.vote_count, a.current_user_vote), (5, None));
        assert!(matches!(
            cache.status(a_id),
            Some(SyncStatus::RolledBack { .. })
        ));

        let b = cache.item(b_id).unwrap();
        assert_eq!(b.vote_count, 2);
        assert_eq!(cache.status(b_id), Some(&SyncStatus::Pending));
        assert!(cache.confirm(&b_ticket, &outcome(-1, 2, Some(VoteDirection::Down))));
    }

    #[test]
    fn second_vote_chains_off_first() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let _first = cache.begin_vote(id, VoteDirection::Up).unwrap();
        let _second = cache.begin_vote(id, VoteDirection::Down).unwrap();

        let shown = cache.item(id).unwrap();
        assert_eq!(shown.vote_count, 4);
        assert_eq!(shown.current_user_vote, Some(VoteDirection::Down));
    }

    #[test]
    fn stale_response_does_not_overwrite_newer_state() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let first = cache.begin_vote(id, VoteDirection::Up).unwrap();
        let second = cache.begin_vote(id, VoteDirection::Up).unwrap();
        assert_eq!(cache.item(id).unwrap().vote_count, 5);

        // Second answer arrives first.
        assert!(cache.confirm(&second, &outcome(-1, 5, None)));
        // First answer is older than what is applied; ignored for display.
        assert!(!cache.confirm(&first, &outcome(1, 6, Some(VoteDirection::Up))));

        let shown = cache.item(id).unwrap();
        assert_eq!((shown.vote_count, shown.current_user_vote), (5, None));
        assert_eq!(cache.confirmed(id).unwrap().vote_count, 5);
        assert_eq!(cache.status(id), Some(&SyncStatus::Confirmed));
    }

    #[test]
    fn superseded_response_keeps_newer_optimistic_state() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let first = cache.begin_vote(id, VoteDirection::Up).unwrap();
        let _second = cache.begin_vote(id, VoteDirection::Down).unwrap();

        assert!(!cache.confirm(&first, &outcome(1, 6, Some(VoteDirection::Up))));
        let shown = cache.item(id).unwrap();
        assert_eq!((shown.vote_count, shown.current_user_vote), (4, Some(VoteDirection::Down)));
        assert_eq!(cache.status(id), Some(&SyncStatus::Pending));
    }

    #[test]
    fn failure_restores_state_prior_to_that_request() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let _first = cache.begin_vote(id, VoteDirection::Up).unwrap();
        let second = cache.begin_vote(id, VoteDirection::Down).unwrap();

        // Back to the first request's speculative Up, not the baseline.
        assert!(cache.fail(&second, &ClientError::Unauthorized));
        let shown = cache.item(id).unwrap();
        assert_eq!((shown.vote_count, shown.current_user_vote), (6, Some(VoteDirection::Up)));
        assert_eq!(cache.status(id), Some(&SyncStatus::Pending));
    }

    #[test]
    fn failed_predecessor_hands_restore_point_on() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let first = cache.begin_vote(id, VoteDirection::Up).unwrap();
        let second = cache.begin_vote(id, VoteDirection::Down).unwrap();

        assert!(!cache.fail(&first, &ClientError::Unauthorized));
        assert_eq!(cache.item(id).unwrap().vote_count, 4);

        assert!(cache.fail(&second, &ClientError::Unauthorized));
        let shown = cache.item(id).unwrap();
        assert_eq!((shown.vote_count, shown.current_user_vote), (5, None));
    }

    #[test]
    fn older_failure_after_newer_confirmation_keeps_server_state() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let first = cache.begin_vote(id, VoteDirection::Up).unwrap();
        let second = cache.begin_vote(id, VoteDirection::Down).unwrap();

        assert!(cache.confirm(&second, &outcome(-1, 4, Some(VoteDirection::Down))));
        let error = ClientError::Server {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(!cache.fail(&first, &error));

        let shown = cache.item(id).unwrap();
        assert_eq!((shown.vote_count, shown.current_user_vote), (4, Some(VoteDirection::Down)));
        assert_eq!(cache.status(id), Some(&SyncStatus::Confirmed));
        assert_eq!(
            cache.confirmed(id),
            Some(VoteSnapshot {
                vote_count: 4,
                user_vote: Some(VoteDirection::Down)
            })
        );
    }

    #[test]
    fn older_success_after_newer_confirmation_is_ignored() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let first = cache.begin_vote(id, VoteDirection::Up).unwrap();
        let second = cache.begin_vote(id, VoteDirection::Down).unwrap();

        assert!(cache.confirm(&second, &outcome(-1, 4, Some(VoteDirection::Down))));
        assert!(!cache.confirm(&first, &outcome(1, 6, Some(VoteDirection::Up))));

        let shown = cache.item(id).unwrap();
        assert_eq!((shown.vote_count, shown.current_user_vote), (4, Some(VoteDirection::Down)));
        assert_eq!(cache.confirmed(id).unwrap().vote_count, 4);
        assert_eq!(cache.status(id), Some(&SyncStatus::Confirmed));
    }

    #[test]
    fn newer_failure_reverts_to_older_confirmed_answer() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item]);

        let first = cache.begin_vote(id, VoteDirection::Up).unwrap();
        let second = cache.begin_vote(id, VoteDirection::Down).unwrap();

        // Others voted meanwhile; the first answer carries the newer count.
        assert!(!cache.confirm(&first, &outcome(1, 9, Some(VoteDirection::Up))));
        assert!(cache.fail(&second, &ClientError::Unauthorized));

        let shown = cache.item(id).unwrap();
        assert_eq!((shown.vote_count, shown.current_user_vote), (9, Some(VoteDirection::Up)));
        assert!(matches!(
            cache.status(id),
            Some(SyncStatus::RolledBack { .. })
        ));
    }

    #[test]
    fn replaced_list_ignores_old_tickets() {
        let item = view(5, Category::News);
        let id = item.id;
        let mut cache = cache_with(vec![item.clone()]);

        let ticket = cache.begin_vote(id, VoteDirection::Up).unwrap();
        cache.replace(vec![item]);

        assert!(!cache.confirm(&ticket, &outcome(1, 6, Some(VoteDirection::Up))));
        assert_eq!(cache.item(id).unwrap().vote_count, 5);
    }

    #[test]
    fn view_filters_and_sorts() {
        let low = view(1, Category::Blog);
        let high = view(8, Category::News);
        let mid = view(4, Category::Blog);
        let ids = (low.id, high.id, mid.id);
        let mut cache = cache_with(vec![low, high, mid]);

        let all: Vec<_> = cache.view(CategoryFilter::All).iter().map(|i| i.id).collect();
        assert_eq!(all, vec![ids.1, ids.2, ids.0]);

        // Optimistic changes reorder immediately.
        cache.begin_vote(ids.0, VoteDirection::Up).unwrap();
        cache.begin_vote(ids.0, VoteDirection::Down).unwrap();
        let blogs: Vec<_> = cache
            .view(CategoryFilter::Only(Category::Blog))
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(blogs, vec![ids.2, ids.0]);
    }

    #[test]
    fn unknown_item_is_rejected() {
        let mut cache = VoteCache::new();
        assert!(matches!(
            cache.begin_vote(Uuid::new_v4(), VoteDirection::Up),
            Err(ClientError::UnknownItem(_))
        ));
    }
}

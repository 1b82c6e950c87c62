use crate::domain::card::PartId;
use crate::domain::error::GameError;
use crate::domain::ledger::PartLedger;
use crate::domain::player::{PlayerId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub type OfferId = Uuid;
pub type RequestId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Open,
    Closed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

/// A market listing: parts the owner gives, optionally locked to an exact
/// set the owner wants in return (empty want-set means open to any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOffer {
    pub id: OfferId,
    #[serde(rename = "ownerId")]
    pub owner: PlayerId,
    pub give: Vec<PartId>,
    pub want: Vec<PartId>,
    pub status: OfferStatus,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    pub requests: Vec<MarketRequest>,
}

impl MarketOffer {
    /// A locked offer only accepts its exact want-set in exchange.
    pub fn is_locked(&self) -> bool {
        !self.want.is_empty()
    }

    pub fn pending_request_from(&self, requester: &PlayerId) -> Option<&MarketRequest> {
        self.requests
            .iter()
            .find(|r| r.requester == *requester && r.status == RequestStatus::Pending)
    }
}

/// A counterparty's proposed exchange against an open offer.
/// Terminal once accepted or declined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRequest {
    pub id: RequestId,
    #[serde(rename = "offerId")]
    pub offer_id: OfferId,
    #[serde(rename = "requesterId")]
    pub requester: PlayerId,
    pub give: Vec<PartId>,
    pub status: RequestStatus,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
}

/// Outcome of an accepted trade, for broadcast composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedTrade {
    pub offer_id: OfferId,
    pub request_id: RequestId,
    pub owner: PlayerId,
    pub requester: PlayerId,
    pub owner_gave: Vec<PartId>,
    pub requester_gave: Vec<PartId>,
}

/// The two-phase trading engine of a room, built on [`PartLedger`].
///
/// The offer/request split exists because acceptance must be atomic and
/// exclusive: an offer accepts at most one counterparty, and every rival
/// pending request is cascade-declined in the same mutation. Ownership is
/// re-validated at accept time, not only at request time, because an
/// intervening trade can invalidate a pending request's premise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    offers: HashMap<OfferId, MarketOffer>,
}

/// Deduplicate an id set while preserving first-seen order.
fn dedupe(ids: Vec<PartId>) -> Vec<PartId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn same_set(a: &[PartId], b: &[PartId]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let set: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.iter().all(|id| set.contains(id.as_str()))
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offers(&self) -> &HashMap<OfferId, MarketOffer> {
        &self.offers
    }

    pub fn offer(&self, id: &OfferId) -> Option<&MarketOffer> {
        self.offers.get(id)
    }

    /// Post a new offer. The offered set must be non-empty and currently
    /// held by the owner.
    pub fn create_offer(
        &mut self,
        ledger: &PartLedger,
        owner: PlayerId,
        give: Vec<PartId>,
        want: Vec<PartId>,
    ) -> Result<&MarketOffer, GameError> {
        let give = dedupe(give);
        let want = dedupe(want);

        if give.is_empty() {
            return Err(GameError::EmptyOffer);
        }
        if !ledger.holds_all(&owner, &give) {
            return Err(GameError::PartsUnavailable);
        }

        let offer = MarketOffer {
            id: Uuid::new_v4(),
            owner,
            give,
            want,
            status: OfferStatus::Open,
            created_at: Timestamp::now(),
            requests: Vec::new(),
        };
        let id = offer.id;
        Ok(self.offers.entry(id).or_insert(offer))
    }

    /// Propose an exchange against an open offer.
    ///
    /// Locked offers demand the exact want-set (defaulted when the caller
    /// supplies nothing); open offers take whatever non-empty set the
    /// requester holds. At most one pending request per (offer, requester).
    pub fn create_request(
        &mut self,
        ledger: &PartLedger,
        offer_id: OfferId,
        requester: PlayerId,
        give: Vec<PartId>,
    ) -> Result<&MarketRequest, GameError> {
        let offer = self
            .offers
            .get_mut(&offer_id)
            .filter(|o| o.status == OfferStatus::Open)
            .ok_or(GameError::OfferNotFound)?;

        if offer.owner == requester {
            return Err(GameError::CannotRequestOwn);
        }

        let mut give = dedupe(give);
        if offer.is_locked() {
            if give.is_empty() {
                give = offer.want.clone();
            }
            if !same_set(&give, &offer.want) {
                return Err(GameError::RequestMismatch);
            }
        }
        if give.is_empty() {
            return Err(GameError::EmptyRequest);
        }
        if !ledger.holds_all(&requester, &give) {
            return Err(GameError::PartsUnavailable);
        }
        if offer.pending_request_from(&requester).is_some() {
            return Err(GameError::AlreadyRequested);
        }

        offer.requests.push(MarketRequest {
            id: Uuid::new_v4(),
            offer_id,
            requester,
            give,
            status: RequestStatus::Pending,
            created_at: Timestamp::now(),
        });
        Ok(offer.requests.last().expect("just pushed"))
    }

    /// Accept one pending request: atomic swap through the ledger, offer
    /// closed, accepted request terminal, all rival pending requests
    /// cascade-declined. Owner-only.
    pub fn accept_request(
        &mut self,
        ledger: &mut PartLedger,
        offer_id: OfferId,
        request_id: RequestId,
        owner: PlayerId,
    ) -> Result<AcceptedTrade, GameError> {
        let offer = self
            .offers
            .get_mut(&offer_id)
            .filter(|o| o.status == OfferStatus::Open)
            .ok_or(GameError::OfferNotFound)?;

        if offer.owner != owner {
            return Err(GameError::NotYourOffer);
        }

        let request = offer
            .requests
            .iter()
            .find(|r| r.id == request_id && r.status == RequestStatus::Pending)
            .ok_or(GameError::RequestNotFound)?;

        let requester = request.requester;
        let requester_gave = request.give.clone();
        let owner_gave = offer.give.clone();

        // Both sides re-validated inside the swap; parts may have moved via
        // another trade since this request was created.
        ledger.swap(&owner, &owner_gave, &requester, &requester_gave)?;

        offer.status = OfferStatus::Closed;
        for req in &mut offer.requests {
            if req.id == request_id {
                req.status = RequestStatus::Accepted;
            } else if req.status == RequestStatus::Pending {
                req.status = RequestStatus::Declined;
            }
        }

        Ok(AcceptedTrade {
            offer_id,
            request_id,
            owner,
            requester,
            owner_gave,
            requester_gave,
        })
    }

    /// Decline a single pending request. Owner-only.
    pub fn decline_request(
        &mut self,
        offer_id: OfferId,
        request_id: RequestId,
        owner: PlayerId,
    ) -> Result<(), GameError> {
        let offer = self.offers.get_mut(&offer_id).ok_or(GameError::OfferNotFound)?;
        if offer.owner != owner {
            return Err(GameError::NotYourOffer);
        }

        let request = offer
            .requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == RequestStatus::Pending)
            .ok_or(GameError::RequestNotFound)?;

        request.status = RequestStatus::Declined;
        Ok(())
    }

    /// Cancel an offer and cascade-decline its pending requests. Owner-only.
    pub fn cancel_offer(&mut self, offer_id: OfferId, owner: PlayerId) -> Result<(), GameError> {
        let offer = self.offers.get_mut(&offer_id).ok_or(GameError::OfferNotFound)?;
        if offer.owner != owner {
            return Err(GameError::NotYourOffer);
        }

        offer.status = OfferStatus::Cancelled;
        for req in &mut offer.requests {
            if req.status == RequestStatus::Pending {
                req.status = RequestStatus::Declined;
            }
        }
        Ok(())
    }

    /// Cascade when a player leaves: their open offers are cancelled and
    /// their pending requests on other offers declined.
    pub fn purge_player(&mut self, player: &PlayerId) {
        for offer in self.offers.values_mut() {
            if offer.owner == *player && offer.status == OfferStatus::Open {
                offer.status = OfferStatus::Cancelled;
                for req in &mut offer.requests {
                    if req.status == RequestStatus::Pending {
                        req.status = RequestStatus::Declined;
                    }
                }
            }
            for req in &mut offer.requests {
                if req.requester == *player && req.status == RequestStatus::Pending {
                    req.status = RequestStatus::Declined;
                }
            }
        }
    }

    /// Rewrite every reference to an old identity (rebind).
    pub fn rewrite_identity(&mut self, old: &PlayerId, new: PlayerId) {
        for offer in self.offers.values_mut() {
            if offer.owner == *old {
                offer.owner = new;
            }
            for req in &mut offer.requests {
                if req.requester == *old {
                    req.requester = new;
                }
            }
        }
    }
}

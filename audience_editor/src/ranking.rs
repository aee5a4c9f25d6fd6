//! src/ranking.rs
use serde::Serialize;

use crate::{
    backend::Backend,
    error::Result,
    model::{Client, Group, RawClient},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedClient {
    pub email:    String,
    pub times:    u32,
    pub inactive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRanking {
    pub group:   Group,
    pub clients: Vec<RankedClient>,
}

/// Most-contacted clients per backed group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactRanking {
    pub groups:         Vec<GroupRanking>,
    pub total_inactive: usize,
}

/// Contacted clients of one roster, most contacted first. Bare email
/// entries carry no counters and are skipped.
pub fn rank(raw: Vec<RawClient>) -> Vec<RankedClient> {
    let mut ranked: Vec<RankedClient> = raw
        .into_iter()
        .filter_map(|r| match r {
            RawClient::Record(c) => Some(c),
            RawClient::Bare(_)   => None,
        })
        .filter_map(|c: Client| match c.times_contacted {
            Some(times) if times > 0 => Some(RankedClient {
                email: c.email,
                times,
                inactive: c.inactive.unwrap_or(false),
            }),
            _ => None,
        })
        .collect();
    ranked.sort_by(|a, b| b.times.cmp(&a.times));
    ranked
}

/// Ranks every backed group. Any failed fetch fails the whole ranking.
pub async fn contact_ranking(backend: &dyn Backend) -> Result<ContactRanking> {
    let mut groups = Vec::new();
    for group in Group::BACKED {
        let clients = rank(backend.list_clients(group).await?);
        if !clients.is_empty() {
            groups.push(GroupRanking { group, clients });
        }
    }

    let total_inactive = groups
        .iter()
        .flat_map(|g| g.clients.iter())
        .filter(|c| c.inactive)
        .count();

    Ok(ContactRanking { groups, total_inactive })
}

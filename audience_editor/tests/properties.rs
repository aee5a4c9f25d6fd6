//! Property tests over the audience stores and the view projection.
use std::{collections::HashSet, sync::Arc};

use audience_editor::{
    backend::InMemoryBackend,
    model::{Client, Group, RawClient, StatusFilter},
    view::{project, ViewState, PAGE_SIZE},
    AudienceSession,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

const POOL: [&str; 6] = ["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com", "bad-email"];

#[derive(Debug, Clone)]
enum Op {
    AddRoster(usize),
    AddStaging(usize, bool),
    Transfer(usize),
    RemoveStaging(usize),
    Reload,
    StagingOnly,
}

fn arb_op() -> impl Strategy<Value = Op> {
    let idx = 0..POOL.len();
    prop_oneof![
        idx.clone().prop_map(Op::AddRoster),
        (idx.clone(), any::<bool>()).prop_map(|(i, m)| Op::AddStaging(i, m)),
        idx.clone().prop_map(Op::Transfer),
        idx.clone().prop_map(Op::RemoveStaging),
        Just(Op::Reload),
        Just(Op::StagingOnly),
    ]
}

fn arb_client() -> impl Strategy<Value = Client> {
    ("[a-d]{1,3}", any::<bool>()).prop_map(|(local, sent)| Client {
        last_sent: sent.then(|| Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        ..Client::new(format!("{local}@Mail.com"))
    })
}

fn unique(list: &[Client]) -> bool {
    let mut seen = HashSet::new();
    list.iter().all(|c| seen.insert(c.email.clone()))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    #[test]
    fn no_email_appears_twice_in_either_list(ops in prop::collection::vec(arb_op(), 1..40)) {
        runtime().block_on(async {
            let backend = Arc::new(InMemoryBackend::new());
            backend.seed(Group::New, vec![
                RawClient::Bare("a@x.com".into()),
                RawClient::Bare("b@x.com".into()),
                RawClient::Bare("a@x.com".into()),
            ]);
            let session = AudienceSession::new(backend, Group::New);
            session.select_group(Group::New).await.unwrap();

            for op in ops {
                match op {
                    Op::AddRoster(i)        => { let _ = session.add_to_roster(POOL[i]).await; }
                    Op::AddStaging(i, m)    => { let _ = session.add_to_staging(POOL[i], &m).await; }
                    Op::RemoveStaging(i)    => { session.remove_from_staging(POOL[i]); }
                    Op::Reload              => { let _ = session.select_group(Group::New).await; }
                    Op::StagingOnly => {
                        session.select_group(Group::None).await.unwrap();
                        assert!(session.roster().clients().is_empty());
                        assert!(session.view().visible.is_empty());
                        assert_eq!(session.effective_audience(), session.staging().current());
                    }
                    Op::Transfer(i) => {
                        if let Ok(payload) = session.begin_drag(POOL[i]) {
                            let report = session.drop_on_staging(&payload).unwrap();
                            assert!(session.staging().contains(&report.email));
                            assert!(session.roster().find(&report.email).is_none());
                        }
                    }
                }
                assert!(unique(&session.roster().clients()));
                assert!(unique(&session.staging().current()));
            }
        });
    }

    #[test]
    fn transfer_conserves_regardless_of_prior_staging(pre_staged in any::<bool>(), idx in 0usize..3) {
        runtime().block_on(async {
            let emails = ["a@x.com", "b@x.com", "c@x.com"];
            let backend = Arc::new(InMemoryBackend::new());
            backend.seed(Group::New, emails.iter().map(|e| RawClient::Bare(e.to_string())).collect());
            let session = AudienceSession::new(backend, Group::New);
            session.select_group(Group::New).await.unwrap();

            let e = emails[idx];
            if pre_staged {
                session.add_to_staging(e, &false).await.unwrap();
            }
            let payload = session.begin_drag(e).unwrap();
            session.drop_on_staging(&payload).unwrap();

            assert!(session.staging().contains(e));
            assert!(session.roster().find(e).is_none());
            assert_eq!(session.staging().current().len(), 1);
        });
    }

    #[test]
    fn pagination_sizes_hold(n in 0usize..80, page in 1usize..10) {
        let roster: Vec<Client> = (0..n).map(|i| Client::new(format!("u{i}@x.com"))).collect();
        let out = project(&roster, &[], &ViewState { page, ..ViewState::default() });

        let expected_pages = std::cmp::max(1, (n + PAGE_SIZE - 1) / PAGE_SIZE);
        prop_assert_eq!(out.total_pages, expected_pages);
        prop_assert_eq!(out.total_filtered, n);
        if page <= expected_pages {
            prop_assert_eq!(out.page, page);
            prop_assert_eq!(out.visible.len(), PAGE_SIZE.min(n - (page - 1) * PAGE_SIZE));
        } else {
            prop_assert_eq!(out.page, expected_pages);
        }
    }

    #[test]
    fn status_filter_narrows_search(
        roster in prop::collection::vec(arb_client(), 0..40),
        term in "[a-dA-D@]{0,2}",
    ) {
        let mut seen = HashSet::new();
        let roster: Vec<Client> = roster.into_iter().filter(|c| seen.insert(c.email.clone())).collect();
        let everything = ViewState { page: 1, search: term.clone(), filter: StatusFilter::None };
        let narrowed   = ViewState { filter: StatusFilter::Uncontacted, ..everything.clone() };

        // every match across all pages
        let big = |st: &ViewState| -> Vec<String> {
            let pages = project(&roster, &[], st).total_pages;
            (1..=pages)
                .flat_map(|p| project(&roster, &[], &ViewState { page: p, ..st.clone() }).visible)
                .map(|c| c.email)
                .collect()
        };
        let all: HashSet<String> = big(&everything).into_iter().collect();
        for email in big(&narrowed) {
            prop_assert!(all.contains(&email));
        }
    }
}

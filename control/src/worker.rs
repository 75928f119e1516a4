//! Reconcile workers
//!
//! Each worker pulls group requests from the [`GroupQueue`] and hands the
//! decoded [`GroupId`] to a [`GroupReconciler`]. Failures are logged and
//! counted; the next node event or periodic resync enqueues the group again.

use crate::apis::ingress::class::ClassFilter;
use crate::apis::ingress::group::{ingress_key, load_group_members, GroupBuilder};
use crate::apis::ingress::lister::IngressLister;
use crate::apis::metrics::record_group_reconciliation;
use crate::error::RautaError;
use crate::queue::GroupQueue;
use async_trait::async_trait;
use common::GroupId;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Reconciles one ingress group
#[async_trait]
pub trait GroupReconciler: Send + Sync {
    async fn reconcile(&self, group: &GroupId) -> Result<(), RautaError>;
}

/// Resolves and logs the members of a group without touching any load balancer
pub struct GroupMembersReconciler {
    ingress_class: String,
    lister: Arc<dyn IngressLister>,
    class_filter: ClassFilter,
    group_builder: Arc<dyn GroupBuilder>,
}

impl GroupMembersReconciler {
    pub fn new(
        ingress_class: impl Into<String>,
        lister: Arc<dyn IngressLister>,
        class_filter: ClassFilter,
        group_builder: Arc<dyn GroupBuilder>,
    ) -> Self {
        Self {
            ingress_class: ingress_class.into(),
            lister,
            class_filter,
            group_builder,
        }
    }
}

#[async_trait]
impl GroupReconciler for GroupMembersReconciler {
    async fn reconcile(&self, group: &GroupId) -> Result<(), RautaError> {
        let kind = if group.is_explicit() {
            "explicit"
        } else {
            "implicit"
        };
        let start = Instant::now();

        let result = load_group_members(
            self.lister.as_ref(),
            self.class_filter,
            &self.ingress_class,
            self.group_builder.as_ref(),
            group,
        );

        let outcome = if result.is_ok() { "success" } else { "error" };
        record_group_reconciliation(kind, start.elapsed().as_secs_f64(), outcome);

        let members = result?;
        if members.is_empty() {
            info!("Ingress group {} has no members, nothing to reconcile", group);
            return Ok(());
        }

        let keys: Vec<String> = members.iter().map(|ing| ingress_key(ing)).collect();
        info!(
            "Reconciled ingress group {} ({} member(s)): {}",
            group,
            keys.len(),
            keys.join(", ")
        );
        Ok(())
    }
}

/// Process requests until the queue shuts down
///
/// This function runs until `queue.shut_down()`. Call it in a tokio::spawn() task.
pub async fn run_worker(id: usize, queue: Arc<GroupQueue>, reconciler: Arc<dyn GroupReconciler>) {
    debug!("Reconcile worker {} started", id);

    while let Some(request) = queue.get().await {
        let group = GroupId::decode_from_reconcile_request(&request);

        if let Err(e) = reconciler.reconcile(&group).await {
            error!(worker = id, group = %group, error = %e, "Ingress group reconciliation failed");
        }

        queue.done(&request);
    }

    debug!("Reconcile worker {} stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::ingress::class::matches_ingress_class;
    use crate::apis::ingress::group::{AnnotationGroupBuilder, GROUP_NAME_ANNOTATION};
    use crate::config::QueueConfig;
    use crate::queue::ReconcileQueue;
    use k8s_openapi::api::networking::v1::Ingress;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedLister(Result<Vec<Arc<Ingress>>, ()>);

    impl IngressLister for FixedLister {
        fn list(&self) -> Result<Vec<Arc<Ingress>>, RautaError> {
            self.0.clone().map_err(|_| RautaError::CacheNotSynced { kind: "Ingress" })
        }
    }

    #[derive(Default)]
    struct RecordingReconciler {
        seen: Mutex<Vec<GroupId>>,
        fail: bool,
    }

    #[async_trait]
    impl GroupReconciler for RecordingReconciler {
        async fn reconcile(&self, group: &GroupId) -> Result<(), RautaError> {
            self.seen.lock().unwrap().push(group.clone());
            if self.fail {
                return Err(RautaError::CacheNotSynced { kind: "Ingress" });
            }
            Ok(())
        }
    }

    fn ingress(namespace: &str, name: &str, group: Option<&str>) -> Arc<Ingress> {
        Arc::new(Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                annotations: group.map(|g| {
                    BTreeMap::from([(GROUP_NAME_ANNOTATION.to_string(), g.to_string())])
                }),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn reconciler(lister: FixedLister) -> GroupMembersReconciler {
        GroupMembersReconciler::new(
            "",
            Arc::new(lister),
            matches_ingress_class,
            Arc::new(AnnotationGroupBuilder),
        )
    }

    fn queue() -> Arc<GroupQueue> {
        Arc::new(GroupQueue::new(&QueueConfig {
            qps: 1000.0,
            burst: 1000,
        }))
    }

    #[tokio::test]
    async fn test_members_reconciler_succeeds_for_known_group() {
        let r = reconciler(FixedLister(Ok(vec![
            ingress("prod", "a", Some("edge")),
            ingress("prod", "b", Some("edge")),
        ])));

        let group = GroupId::explicit("edge").unwrap();
        assert!(r.reconcile(&group).await.is_ok());
    }

    #[tokio::test]
    async fn test_members_reconciler_empty_group_is_ok() {
        let r = reconciler(FixedLister(Ok(vec![])));
        assert!(r.reconcile(&GroupId::implicit("prod", "gone")).await.is_ok());
    }

    #[tokio::test]
    async fn test_members_reconciler_propagates_list_failure() {
        let r = reconciler(FixedLister(Err(())));
        let result = r.reconcile(&GroupId::implicit("prod", "a")).await;
        assert!(matches!(result, Err(RautaError::CacheNotSynced { .. })));
    }

    #[tokio::test]
    async fn test_worker_decodes_requests_and_stops_on_shutdown() {
        let q = queue();
        let recorder = Arc::new(RecordingReconciler::default());

        q.add(GroupId::explicit("edge").unwrap().encode_to_reconcile_request());
        q.add(GroupId::implicit("prod", "solo").encode_to_reconcile_request());

        let handle = tokio::spawn(run_worker(1, q.clone(), recorder.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        q.shut_down();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("Worker should stop after shutdown")
            .expect("Worker should not panic");

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                GroupId::explicit("edge").unwrap(),
                GroupId::implicit("prod", "solo")
            ]
        );
    }

    #[tokio::test]
    async fn test_worker_failure_is_not_requeued() {
        let q = queue();
        let recorder = Arc::new(RecordingReconciler {
            fail: true,
            ..Default::default()
        });

        q.add(GroupId::explicit("edge").unwrap().encode_to_reconcile_request());
        let handle = tokio::spawn(run_worker(1, q.clone(), recorder.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        q.shut_down();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
        assert!(q.is_empty());
    }
}

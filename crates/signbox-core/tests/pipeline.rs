//! End-to-end wiring: uploads registered in the resolver, jobs triggered on
//! the builder, a processor that reads and writes uploads through the resolver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use signbox_core::{
    Builder, IntegratedBuilder, IntegratedConfig, JobContext, SignboxError, UploadInfo,
    UploadResolver,
};
use tempfile::TempDir;

async fn eventually<F: Fn() -> bool>(cond: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Stand-in for the signing step: append a marker, store it as `<id>-signed`,
/// drop the input.
async fn sign_next(
    resolver: &UploadResolver,
    pending: &Mutex<Vec<String>>,
    ctx: &JobContext,
) -> Result<(), SignboxError> {
    let Some(id) = pending.lock().unwrap().pop() else {
        return Ok(());
    };
    let upload = resolver
        .get(&id)
        .ok_or_else(|| SignboxError::processing(format!("{id} vanished")))?;
    let mut bytes = upload.read()?;
    bytes.extend_from_slice(b"+signed");

    let output = resolver.add(&format!("{id}-signed"))?;
    output.write(&bytes)?;
    output.set_info(&UploadInfo::new(format!("{id}.ipa")))?;
    resolver.delete(&id)?;

    if ctx.is_expired() {
        return Err(SignboxError::processing("deadline passed"));
    }
    Ok(())
}

#[tokio::test]
async fn processor_signs_pending_uploads_one_at_a_time() {
    let dir = TempDir::new().unwrap();
    let resolver = Arc::new(UploadResolver::open(dir.path()).unwrap());
    let builder = IntegratedBuilder::new(IntegratedConfig {
        enable: true,
        ..Default::default()
    })
    .unwrap();

    let pending: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let signed = Arc::new(AtomicUsize::new(0));

    {
        let resolver = Arc::clone(&resolver);
        let pending = Arc::clone(&pending);
        let signed = Arc::clone(&signed);
        builder
            .set_processor(move |ctx: JobContext| {
                let resolver = Arc::clone(&resolver);
                let pending = Arc::clone(&pending);
                let signed = Arc::clone(&signed);
                async move {
                    sign_next(&resolver, &pending, &ctx).await?;
                    signed.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), SignboxError>(())
                }
            })
            .unwrap();
    }

    for i in 0..3 {
        let id = format!("app{i}");
        let upload = resolver.add(&id).unwrap();
        upload.write(b"bytes").unwrap();
        pending.lock().unwrap().push(id);
        builder.trigger().unwrap();
    }

    eventually(|| signed.load(Ordering::SeqCst) == 3).await;
    eventually(|| builder.status().active_jobs == 0).await;

    assert_eq!(
        resolver.ids(),
        vec!["app0-signed", "app1-signed", "app2-signed"]
    );
    let out = resolver.get("app1-signed").unwrap();
    assert_eq!(out.read().unwrap(), b"bytes+signed");
    assert_eq!(out.info().unwrap().unwrap().file_name, "app1.ipa");
}

#[tokio::test]
async fn restart_recovers_uploads_and_evicts_stale_ones() {
    let dir = TempDir::new().unwrap();
    {
        let resolver = UploadResolver::open(dir.path()).unwrap();
        resolver.add("kept").unwrap();
        let stale = resolver.add("stale").unwrap();
        let file = std::fs::File::options()
            .write(true)
            .open(stale.path())
            .unwrap();
        file.set_modified(std::time::SystemTime::now() - Duration::from_secs(7200))
            .unwrap();
    }

    // fresh process: empty table, same disk
    let resolver = UploadResolver::new(dir.path());
    assert!(resolver.is_empty());
    let report = resolver.cleanup(Duration::from_secs(3600));
    assert_eq!(report.orphans, 1);
    assert_eq!(report.deleted, 1);

    resolver.refresh().unwrap();
    assert_eq!(resolver.ids(), vec!["kept"]);
}

#[test]
fn full_queue_scenario() {
    let builder = IntegratedBuilder::new(IntegratedConfig {
        queue_capacity: 2,
        ..Default::default()
    })
    .unwrap();
    builder.trigger().unwrap();
    builder.trigger().unwrap();
    assert!(matches!(builder.trigger(), Err(SignboxError::QueueFull)));

    let status = builder.status();
    assert_eq!(status.pending_jobs, 2);
    assert_eq!(status.active_jobs, 0);

    builder.set_secrets(HashMap::new()).unwrap();
    let url = builder.status_url().unwrap();
    assert!(url.contains(r#""pending_jobs":2"#));
}

use bit_core::{HashStream, MemoryBackend, SlotError, StorageBackend, UnitRef, Workspace};
use futures::future::join_all;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

use common::{TERMINATION_TIMEOUT, backend, open_repository};

async fn assert_terminates(unit: &UnitRef) {
    tokio::time::timeout(TERMINATION_TIMEOUT, unit.terminated())
        .await
        .unwrap_or_else(|_| panic!("{unit} is still alive"));
    assert!(!unit.is_alive());
}

#[rstest]
#[tokio::test]
async fn default_working_tree_is_latched_once(
    backend: MemoryBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = open_repository(&backend, "project");
    assert_eq!(repository.default_working_tree().await?, None);

    let w1 = Workspace::start(&repository, "project")?;
    repository.set_default_working_tree(w1.unit()).await?;
    assert_eq!(repository.default_working_tree().await?.as_ref(), Some(w1.unit()));

    let w2 = Workspace::start(&repository, "project-linked")?;
    let result = repository.set_default_working_tree(w2.unit()).await;

    assert!(matches!(result, Err(SlotError::AlreadySet(_))));
    assert_eq!(repository.default_working_tree().await?.as_ref(), Some(w1.unit()));

    Ok(())
}

#[rstest]
#[tokio::test]
async fn stopping_repository_terminates_every_working_tree(
    backend: MemoryBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = open_repository(&backend, "project");
    let w1 = Workspace::start(&repository, "project")?;
    let w2 = Workspace::start(&repository, "project-linked")?;
    repository.set_default_working_tree(w1.unit()).await?;

    repository.stop().await?;

    assert_terminates(w1.unit()).await;
    assert_terminates(w2.unit()).await;
    repository.unit().terminated().await;
    assert!(backend.repositories().is_empty());

    Ok(())
}

#[rstest]
#[tokio::test]
async fn working_trees_of_other_repositories_survive(
    backend: MemoryBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let doomed = open_repository(&backend, "doomed");
    let survivor = open_repository(&backend, "survivor");
    let doomed_tree = Workspace::start(&doomed, "doomed")?;
    let surviving_tree = Workspace::start(&survivor, "survivor")?;

    doomed.stop().await?;
    assert_terminates(doomed_tree.unit()).await;

    assert!(surviving_tree.is_alive());
    assert_eq!(surviving_tree.owner().await?, survivor.unit().clone());
    assert_eq!(backend.repositories(), vec![survivor]);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn unrelated_units_are_never_latched(
    backend: MemoryBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = open_repository(&backend, "project");
    let other = open_repository(&backend, "other");
    let stream = HashStream::open_buffer(common::trailer_hashed(b"hello"));

    for candidate in [other.unit(), stream.unit(), repository.unit()] {
        let result = repository.set_default_working_tree(candidate).await;
        assert!(matches!(result, Err(SlotError::NotAWorkingTree(_))));
    }

    assert_eq!(repository.default_working_tree().await?, None);

    // the slot is still open for a real working tree
    let working_tree = Workspace::start(&repository, "project")?;
    repository.set_default_working_tree(working_tree.unit()).await?;

    Ok(())
}

#[rstest]
#[tokio::test]
async fn mutual_latch_attempts_between_repositories_do_not_block(
    backend: MemoryBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let left = open_repository(&backend, "left");
    let right = open_repository(&backend, "right");

    let (left_result, right_result) = tokio::time::timeout(TERMINATION_TIMEOUT, async {
        tokio::join!(
            left.set_default_working_tree(right.unit()),
            right.set_default_working_tree(left.unit()),
        )
    })
    .await?;

    assert!(matches!(left_result, Err(SlotError::NotAWorkingTree(_))));
    assert!(matches!(right_result, Err(SlotError::NotAWorkingTree(_))));

    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_latch_attempts_have_a_single_winner(
    backend: MemoryBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = open_repository(&backend, "project");
    let candidates = (0..32)
        .map(|i| Workspace::start(&repository, format!("tree-{i}")))
        .collect::<Result<Vec<_>, _>>()?;

    let attempts = candidates.iter().map(|candidate| {
        let repository = repository.clone();
        let unit = candidate.unit().clone();
        tokio::spawn(async move { repository.set_default_working_tree(&unit).await.map(|_| unit) })
    });
    let results = join_all(attempts).await;

    let winners = results
        .into_iter()
        .map(|joined| joined.expect("latch task panicked"))
        .filter_map(Result::ok)
        .collect::<Vec<_>>();

    assert_eq!(winners.len(), 1);
    assert_eq!(repository.default_working_tree().await?.as_ref(), Some(&winners[0]));

    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn just_stopped_working_tree_is_never_latched(
    backend: MemoryBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = open_repository(&backend, "project");

    for i in 0..500 {
        let working_tree = Workspace::start(&repository, format!("tree-{i}"))?;
        assert!(working_tree.stop().await?);

        assert!(!Workspace::is_valid(working_tree.unit()));
        let result = repository.set_default_working_tree(working_tree.unit()).await;
        assert!(matches!(result, Err(SlotError::NotAWorkingTree(_))));
    }

    assert_eq!(repository.default_working_tree().await?, None);
    Ok(())
}

use anyhow::Result;
use std::sync::Arc;

use fish_shop_bot::dialogue::{state_key, ConversationStore, ShopState};
use fish_shop_bot::store::{KeyValueStore, MemoryStore, StoreError};

fn setup() -> (Arc<MemoryStore>, ConversationStore) {
    let store = Arc::new(MemoryStore::new());
    let conversations = ConversationStore::new(store.clone());
    (store, conversations)
}

/// A chat that never talked to the bot has no state yet
#[tokio::test]
async fn test_unknown_chat_has_no_state() -> Result<()> {
    let (_, conversations) = setup();

    assert_eq!(conversations.load(1).await?, None);

    Ok(())
}

/// States are stored under their upper-case names
#[tokio::test]
async fn test_state_is_stored_by_name() -> Result<()> {
    let (store, conversations) = setup();

    for state in ShopState::ALL {
        conversations.save(77, state).await?;
        assert_eq!(
            store.get(&state_key(77)).await?.as_deref(),
            Some(state.as_str())
        );
        assert_eq!(conversations.load(77).await?, Some(state));
    }

    Ok(())
}

/// Each chat keeps its own conversation
#[tokio::test]
async fn test_chats_are_isolated() -> Result<()> {
    let (_, conversations) = setup();

    conversations.save(1, ShopState::WaitingEmail).await?;
    conversations.save(2, ShopState::HandleCart).await?;

    assert_eq!(conversations.load(1).await?, Some(ShopState::WaitingEmail));
    assert_eq!(conversations.load(2).await?, Some(ShopState::HandleCart));
    assert_eq!(state_key(-100123), "state:-100123");

    Ok(())
}

/// A value the bot did not write is reported, not silently mapped
#[tokio::test]
async fn test_unreadable_state_is_reported() -> Result<()> {
    let (store, conversations) = setup();
    store.set(&state_key(5), "handle_menu").await?;

    match conversations.load(5).await {
        Err(StoreError::Corrupt { key, .. }) => assert_eq!(key, "state:5"),
        other => panic!("expected a corrupt state error, got {other:?}"),
    }

    Ok(())
}

//! End-to-end flows through `Context` with the dummy backend.

use depot_core::backends::{DummyBackend, DummyOptions, DummyPackage};
use depot_core::{
    BackendRegistry, Context, DepotConfig, Filters, ModelSettings, ProxyEvent, ResourcesProxyModel,
    TransactionEvent,
};
use depot_schema::{AddonList, BackendId, ResourceProperty, ResourceState, TransactionStatus};
use std::path::Path;
use std::sync::Arc;

fn settings() -> ModelSettings {
    ModelSettings {
        stream_debounce_ms: 0,
        ..ModelSettings::default()
    }
}

fn slow(name: &str, packages: Vec<DummyPackage>) -> Arc<DummyBackend> {
    Arc::new(DummyBackend::with_options(
        name,
        DummyOptions {
            packages,
            step_delay_ms: 2,
            ..DummyOptions::default()
        },
    ))
}

#[tokio::test]
async fn test_search_merges_backends_and_prefers_application_backend() {
    let mut context = Context::new(ModelSettings {
        current_application_backend: Some(BackendId::new("flatpak")),
        ..settings()
    });
    let apt = Arc::new(DummyBackend::new(
        "apt",
        vec![
            DummyPackage::new("vim").appstream("org.vim.Vim"),
            DummyPackage::new("vim-gtk").comment("Vim with a GTK interface"),
            DummyPackage::new("emacs"),
        ],
    ));
    let flatpak = Arc::new(DummyBackend::new(
        "flatpak",
        vec![DummyPackage::new("org.vim.Vim").name("Vim").appstream("org.vim.Vim")],
    ));
    context.model.register_backend(apt.clone()).unwrap();
    context.model.register_backend(flatpak.clone()).unwrap();

    let mut proxy = ResourcesProxyModel::new(&mut context.model);
    proxy.set_search("vim");
    proxy.wait_for_results(&context.model).await;

    let keys: Vec<_> = proxy.keys().cloned().collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&flatpak.key_of("org.vim.Vim").unwrap()));
    assert!(keys.contains(&apt.key_of("vim-gtk").unwrap()));
    assert!(!keys.contains(&apt.key_of("vim").unwrap()));
    assert!(!proxy.is_busy());

    proxy.set_all_backends(true);
    proxy.wait_for_results(&context.model).await;
    assert_eq!(proxy.row_count(), 3);
}

#[tokio::test]
async fn test_transactions_serialize_per_backend() {
    let mut context = Context::new(settings());
    let apt = slow("apt", vec![DummyPackage::new("vim"), DummyPackage::new("git")]);
    let flatpak = slow("flatpak", vec![DummyPackage::new("org.kde.krita")]);
    context.model.register_backend(apt.clone()).unwrap();
    context.model.register_backend(flatpak.clone()).unwrap();
    let mut events = context.transactions.subscribe();

    let none = AddonList::new();
    let vim = context.install_application(&apt.key_of("vim").unwrap(), &none).unwrap();
    let git = context.install_application(&apt.key_of("git").unwrap(), &none).unwrap();
    let krita = context
        .install_application(&flatpak.key_of("org.kde.krita").unwrap(), &none)
        .unwrap();

    assert_eq!(context.transactions.running_on(&BackendId::new("apt")), Some(vim));
    assert_eq!(context.transactions.running_on(&BackendId::new("flatpak")), Some(krita));
    assert_eq!(
        context.transactions.transaction(git).map(|t| t.status()),
        Some(TransactionStatus::Queued)
    );

    context.wait_for_transactions().await;
    assert!(context.transactions.is_empty());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let position = |wanted: &TransactionEvent| seen.iter().position(|e| e == wanted);
    let vim_done = seen
        .iter()
        .position(|e| matches!(e, TransactionEvent::Removed { id, status: TransactionStatus::Done, .. } if *id == vim))
        .expect("vim finished");
    let git_started = position(&TransactionEvent::Started { id: git }).expect("git started");
    assert!(vim_done < git_started);
    assert_eq!(seen.last(), Some(&TransactionEvent::LastTransactionFinished));

    for name in ["vim", "git"] {
        let key = apt.key_of(name).unwrap();
        assert_eq!(
            context.model.resolve(&key).map(|r| r.state()),
            Some(ResourceState::Installed)
        );
    }
}

#[tokio::test]
async fn test_configured_backends_finish_fetching() {
    let text = r#"
        [model]
        stream_debounce_ms = 0

        [[backends]]
        name = "apt"
        kind = "dummy"
        fetch_delay_ms = 20

        [[backends.packages]]
        package_name = "vim"
        state = "installed"

        [[backends.packages]]
        package_name = "htop"
        state = "upgradeable"
    "#;
    let config = DepotConfig::parse(text, Path::new("scenario.toml")).unwrap();
    let mut context = Context::from_config(&config, &BackendRegistry::with_builtin()).await;
    assert!(context.model.is_fetching());
    assert_eq!(context.model.row_count(), 0);

    context.wait_until_ready().await;
    assert!(!context.model.is_fetching());
    assert_eq!(context.model.row_count(), 2);
    assert_eq!(context.model.updates_count(), 1);

    let started = context.update_all().unwrap();
    assert_eq!(started.len(), 1);
    context.wait_for_transactions().await;
    assert_eq!(context.model.updates_count(), 0);
}

#[tokio::test]
async fn test_view_follows_install() {
    let mut context = Context::new(settings());
    let apt = slow("apt", vec![DummyPackage::new("vim"), DummyPackage::new("vim-gtk")]);
    context.model.register_backend(apt.clone()).unwrap();

    let mut proxy = ResourcesProxyModel::new(&mut context.model);
    proxy.follow_transactions(&mut context.transactions);
    proxy.set_filters(Filters::search("vim"));
    proxy.wait_for_results(&context.model).await;
    assert_eq!(proxy.row_count(), 2);
    let mut proxy_events = proxy.subscribe();

    let key = apt.key_of("vim").unwrap();
    context.install_application(&key, &AddonList::new()).unwrap();
    context.wait_for_transactions().await;
    proxy.process_events(&context.model);

    let row = proxy.index_of(&key).expect("vim still displayed");
    assert_eq!(
        proxy.resource_at(&context.model, row).map(|r| r.state()),
        Some(ResourceState::Installed)
    );
    let mut touched_transaction = false;
    let mut touched_state = false;
    while let Ok(event) = proxy_events.try_recv() {
        if let ProxyEvent::DataChanged { first, properties, .. } = event {
            assert_eq!(first, row);
            touched_transaction |= properties.contains(&ResourceProperty::Transaction);
            touched_state |= properties.contains(&ResourceProperty::State);
        }
    }
    assert!(touched_transaction);
    assert!(touched_state);
}

#[tokio::test]
async fn test_failed_install_leaves_resource_untouched() {
    let mut context = Context::new(settings());
    let apt = Arc::new(DummyBackend::with_options(
        "apt",
        DummyOptions {
            packages: vec![DummyPackage::new("broken")],
            fail_packages: vec!["broken".into()],
            ..DummyOptions::default()
        },
    ));
    context.model.register_backend(apt.clone()).unwrap();
    let mut events = context.transactions.subscribe();

    let key = apt.key_of("broken").unwrap();
    let id = context.install_application(&key, &AddonList::new()).unwrap();
    context.wait_for_transactions().await;

    let mut failure = None;
    while let Ok(event) = events.try_recv() {
        if let TransactionEvent::Removed { id: done, status, error, .. } = event {
            assert_eq!(done, id);
            assert_eq!(status, TransactionStatus::DoneWithError);
            failure = error;
        }
    }
    assert!(failure.is_some_and(|message| message.contains("broken")));
    assert_eq!(
        context.model.resolve(&key).map(|r| r.state()),
        Some(ResourceState::None)
    );
}

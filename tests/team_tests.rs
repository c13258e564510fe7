//! Tests for team orchestration and speaker selection.

mod common;

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use common::MockProvider;
use parley::agent::{Agent, AgentRef, AssistantAgent, ContextScoped};
use parley::agent_loop::{AgentEvent, TerminationState, CANCELLED_NOTICE};
use parley::prelude::*;
use parley::team::{RoundRobin, SelectionState, Team};

fn member(name: &str) -> AgentDescriptor {
    AgentDescriptor::builder()
        .name(name)
        .description(format!("{name} agent"))
        .kind(BehaviorKind::Assistant)
        .build()
}

fn member_with_model(name: &str, model: &str) -> AgentDescriptor {
    AgentDescriptor::builder()
        .name(name)
        .description(format!("{name} agent"))
        .model(model)
        .kind(BehaviorKind::Assistant)
        .build()
}

fn team(team: TeamDescriptor) -> AgentDescriptor {
    AgentDescriptor::builder()
        .name("crew")
        .description("a small crew")
        .kind(BehaviorKind::Team(team))
        .build()
}

fn speakers(events: &[AgentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(AgentEvent::as_message)
        .filter(|m| !m.is_system())
        .map(|m| m.source().to_string())
        .collect()
}

async fn run(agent: &AgentRef, task: &str) -> Vec<AgentEvent> {
    agent
        .on_messages_stream(vec![Message::user(task)], CancellationToken::new())
        .try_collect()
        .await
        .unwrap()
}

#[tokio::test]
async fn round_robin_gives_every_member_equal_turns() {
    let provider = MockProvider::new();
    let factory = AgentFactory::new(ProviderRegistry::with_default(provider.clone()));
    let crew = factory
        .build(&team(
            TeamDescriptor::builder()
                .agents(vec![member("a"), member("b"), member("c")])
                .orchestrator("a")
                .max_messages(6)
                .include_inner_dialog(true)
                .build(),
        ))
        .unwrap();

    let events = run(&crew, "go").await;
    let response = events.last().and_then(AgentEvent::as_response).unwrap();

    assert_eq!(speakers(&events), vec!["a", "b", "c", "a", "b", "c"]);
    assert_eq!(response.state, TerminationState::Completed);
    assert_eq!(response.final_message.source(), "c");
    assert_eq!(response.inner_messages.len(), 5);

    let history_sizes: Vec<usize> = provider.requests().iter().map(|r| r.history.len()).collect();
    assert_eq!(history_sizes, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn members_see_themselves_in_the_context_registry() {
    let provider = MockProvider::new();
    let factory = AgentFactory::new(ProviderRegistry::with_default(provider.clone()));
    let crew = factory
        .build(&team(
            TeamDescriptor::builder()
                .agents(vec![member("a"), member("b")])
                .orchestrator("a")
                .max_messages(2)
                .build(),
        ))
        .unwrap();

    run(&crew, "go").await;

    assert_eq!(
        provider.bound_agents(),
        vec![Some("a".to_string()), Some("b".to_string())]
    );
    assert!(parley::context::current().is_none());
}

#[tokio::test]
async fn nested_team_members_bind_inside_the_outer_speaker() {
    let provider = MockProvider::new();
    let factory = AgentFactory::new(ProviderRegistry::with_default(provider.clone()));
    let inner = AgentDescriptor::builder()
        .name("inner")
        .description("nested crew")
        .kind(BehaviorKind::Team(
            TeamDescriptor::builder()
                .agents(vec![member("x"), member("y")])
                .orchestrator("x")
                .max_messages(2)
                .build(),
        ))
        .build();
    let crew = factory
        .build(&team(
            TeamDescriptor::builder()
                .agents(vec![member("a"), inner])
                .orchestrator("a")
                .max_messages(3)
                .build(),
        ))
        .unwrap();

    let events = run(&crew, "go").await;
    let response = events.last().and_then(AgentEvent::as_response).unwrap();

    assert_eq!(
        provider.bound_agents(),
        vec![
            Some("a".to_string()),
            Some("x".to_string()),
            Some("y".to_string()),
            Some("a".to_string()),
        ]
    );
    assert_eq!(response.final_message.source(), "a");
    assert!(parley::context::current().is_none());
}

#[tokio::test]
async fn termination_phrase_stops_the_team_early() {
    let mut registry = ProviderRegistry::with_default(MockProvider::new());
    registry.register("closer", MockProvider::replying(&["all done. TERMINATE"]));
    let crew = AgentFactory::new(registry)
        .build(&team(
            TeamDescriptor::builder()
                .agents(vec![member("a"), member_with_model("b", "closer"), member("c")])
                .orchestrator("a")
                .build(),
        ))
        .unwrap();

    let events = run(&crew, "go").await;
    let response = events.last().and_then(AgentEvent::as_response).unwrap();

    assert_eq!(speakers(&events), vec!["a", "b"]);
    assert_eq!(response.state, TerminationState::Terminated);
    assert_eq!(response.final_message.source(), "b");
    assert!(response.inner_messages.is_empty());
}

#[tokio::test]
async fn pattern_selection_follows_directives_and_falls_back_to_orchestrator() {
    let mut registry = ProviderRegistry::with_default(MockProvider::replying(&["notes"]));
    registry.register(
        "manager-model",
        MockProvider::replying(&["Plan ready.\nNEXT AGENT: researcher.", "Thanks. TERMINATE"]),
    );
    let crew = AgentFactory::new(registry)
        .build(&team(
            TeamDescriptor::builder()
                .agents(vec![member_with_model("manager", "manager-model"), member("researcher")])
                .orchestrator("manager")
                .selection(SelectionMode::Selector)
                .selection_pattern("NEXT AGENT: {agent_name}")
                .build(),
        ))
        .unwrap();

    let events = run(&crew, "find facts").await;

    assert_eq!(speakers(&events), vec!["manager", "researcher", "manager"]);
}

#[tokio::test]
async fn selecting_a_non_member_is_a_selection_error() {
    let mut registry = ProviderRegistry::with_default(MockProvider::new());
    registry.register("manager-model", MockProvider::replying(&["NEXT AGENT: ghost"]));
    let crew = AgentFactory::new(registry)
        .build(&team(
            TeamDescriptor::builder()
                .agents(vec![member_with_model("manager", "manager-model"), member("researcher")])
                .orchestrator("manager")
                .selection(SelectionMode::Selector)
                .selection_pattern("NEXT AGENT: {agent_name}")
                .build(),
        ))
        .unwrap();

    let err = crew
        .on_messages(vec![Message::user("go")], CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ParleyError::Selection { name, team } => {
            assert_eq!(name, "ghost");
            assert_eq!(team, "crew");
        }
        other => panic!("expected selection error, got {other:?}"),
    }
}

#[tokio::test]
async fn llm_selector_asks_the_orchestrator_model_and_trims_the_answer() {
    let selector = MockProvider::replying(&["  writer \n"]);
    let mut registry = ProviderRegistry::with_default(MockProvider::replying(&["draft. TERMINATE"]));
    registry.register("selector-model", selector.clone());
    let crew = AgentFactory::new(registry)
        .build(&team(
            TeamDescriptor::builder()
                .agents(vec![member_with_model("manager", "selector-model"), member("writer")])
                .orchestrator("manager")
                .selection(SelectionMode::Selector)
                .build(),
        ))
        .unwrap();

    let events = run(&crew, "write a limerick").await;

    assert_eq!(speakers(&events), vec!["writer"]);
    let prompt = selector.requests()[0].history[0].text_content();
    assert!(prompt.contains("writer: writer agent"), "roles missing: {prompt}");
    assert!(prompt.contains("[manager, writer]"), "participants missing: {prompt}");
    assert!(prompt.contains("user: write a limerick"), "history missing: {prompt}");
}

#[tokio::test]
async fn cancelling_a_team_notifies_before_propagating() {
    let factory = AgentFactory::new(ProviderRegistry::with_default(MockProvider::hanging()));
    let crew = factory
        .build(&team(
            TeamDescriptor::builder()
                .agents(vec![member("a"), member("b")])
                .orchestrator("a")
                .build(),
        ))
        .unwrap();
    let cancel = CancellationToken::new();

    let mut stream = crew.on_messages_stream(vec![Message::user("go")], cancel.clone());
    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first, AgentEvent::Partial { ref source, .. } if source == "a"));

    cancel.cancel();
    let notice = stream.next().await.unwrap().unwrap();
    assert_eq!(notice.as_message().unwrap().text_content(), CANCELLED_NOTICE);
    assert!(matches!(stream.next().await, Some(Err(ParleyError::Cancelled))));
}

#[tokio::test]
async fn transcript_persists_across_calls_until_reset() {
    let provider = MockProvider::new();
    let member = |name: &str| -> AgentRef {
        Arc::new(ContextScoped::new(Arc::new(AssistantAgent::new(
            name,
            "",
            provider.clone(),
        ))))
    };
    let team = Team::new("crew", vec![member("a"), member("b")], Box::new(RoundRobin)).with_max_messages(1);
    let cancel = CancellationToken::new();

    let first = team.on_messages(vec![Message::user("one")], cancel.clone()).await.unwrap();
    assert_eq!(first.final_message.source(), "a");
    assert_eq!(team.selection_state().await, SelectionState::Stopped);

    // Messages already in the transcript are not appended twice.
    let mut resent = team.transcript().await;
    resent.push(Message::user("two"));
    let second = team.on_messages(resent, cancel.clone()).await.unwrap();
    assert_eq!(second.final_message.source(), "b");
    assert_eq!(team.transcript().await.len(), 4);

    team.reset().await.unwrap();
    assert!(team.transcript().await.is_empty());
    assert_eq!(team.selection_state().await, SelectionState::AwaitingFirstTurn);

    let third = team.on_messages(vec![Message::user("three")], cancel).await.unwrap();
    assert_eq!(third.final_message.source(), "a");
}

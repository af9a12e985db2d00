//! Integration tests for the SQLite stores over an in-memory database.

use sopforge_core::db::Database;
use sopforge_core::models::example::{Example, ExampleLabel};
use sopforge_core::models::note::{NoteAuthor, NoteContentType, StepNote};
use sopforge_core::models::step::{LogicStrategy, RoutingBranch, WorkflowStep};
use sopforge_core::models::task::Task;
use sopforge_core::models::workflow::{Workflow, WorkflowStatus};
use sopforge_core::store::{
    ExampleStore, NoteStore, StepStore, TaskStore, TemplateStore, WorkflowStore,
};

struct Stores {
    workflows: WorkflowStore,
    tasks: TaskStore,
    steps: StepStore,
    examples: ExampleStore,
    notes: NoteStore,
    templates: TemplateStore,
}

fn stores() -> Stores {
    let db = Database::open_in_memory().unwrap();
    Stores {
        workflows: WorkflowStore::new(db.clone()),
        tasks: TaskStore::new(db.clone()),
        steps: StepStore::new(db.clone()),
        examples: ExampleStore::new(db.clone()),
        notes: NoteStore::new(db.clone()),
        templates: TemplateStore::new(db),
    }
}

async fn seed_workflow(stores: &Stores, name: &str) -> Workflow {
    let workflow = Workflow::new(name.to_string(), None, None);
    stores.workflows.save(&workflow).await.unwrap();
    workflow
}

#[tokio::test]
async fn workflow_crud_round_trip() {
    let stores = stores();
    let mut workflow = seed_workflow(&stores, "Inspection").await;

    let loaded = stores.workflows.get(&workflow.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Inspection");
    assert_eq!(loaded.status, WorkflowStatus::Draft);
    assert!(!loaded.is_template);

    workflow.description = Some("daily rounds".to_string());
    stores.workflows.save(&workflow).await.unwrap();
    let loaded = stores.workflows.get(&workflow.id).await.unwrap().unwrap();
    assert_eq!(loaded.description.as_deref(), Some("daily rounds"));

    assert!(stores.workflows.exists(&workflow.id).await.unwrap());
    assert!(stores.workflows.delete(&workflow.id).await.unwrap());
    assert!(!stores.workflows.exists(&workflow.id).await.unwrap());
    assert!(!stores.workflows.delete(&workflow.id).await.unwrap());
}

#[tokio::test]
async fn listing_is_paginated() {
    let stores = stores();
    for i in 0..5 {
        seed_workflow(&stores, &format!("wf-{}", i)).await;
    }

    let page1 = stores.workflows.list(1, 2).await.unwrap();
    let page2 = stores.workflows.list(2, 2).await.unwrap();
    let page3 = stores.workflows.list(3, 2).await.unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 2);
    assert_eq!(page3.len(), 1);
    assert_eq!(stores.workflows.count().await.unwrap(), 5);
}

#[tokio::test]
async fn update_status_persists_and_touches_timestamp() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;

    stores
        .workflows
        .update_status(&workflow.id, WorkflowStatus::WorkerDone)
        .await
        .unwrap();

    let loaded = stores.workflows.get(&workflow.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, WorkflowStatus::WorkerDone);
    assert!(loaded.updated_at >= workflow.updated_at);
}

#[tokio::test]
async fn aggregate_groups_steps_under_tasks() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;

    let task = Task::new(workflow.id.clone(), "Collect".to_string(), 1, None);
    stores.tasks.save(&task).await.unwrap();

    let mut step1 = WorkflowStep::new(
        workflow.id.clone(),
        Some(task.id.clone()),
        "first".to_string(),
        1,
    );
    step1.extraction_keywords = vec!["reading".to_string()];
    stores.steps.save(&step1).await.unwrap();
    let step2 = WorkflowStep::new(workflow.id.clone(), None, "second".to_string(), 2);
    stores.steps.save(&step2).await.unwrap();

    stores
        .examples
        .save(&Example::new(
            step1.id.clone(),
            "ok".to_string(),
            None,
            ExampleLabel::Pass,
            None,
        ))
        .await
        .unwrap();
    stores
        .steps
        .add_branch(&RoutingBranch::new(
            step1.id.clone(),
            "PASS".to_string(),
            "goto".to_string(),
            "2".to_string(),
        ))
        .await
        .unwrap();
    stores
        .notes
        .save(&StepNote::new(
            step1.id.clone(),
            NoteContentType::Text,
            "remember the torch".to_string(),
            NoteAuthor::Worker,
            None,
        ))
        .await
        .unwrap();

    let aggregate = stores
        .workflows
        .get_aggregate(&workflow.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(aggregate.steps.len(), 2);
    assert_eq!(aggregate.steps[0].name, "first");
    assert_eq!(aggregate.steps[0].extraction_keywords, vec!["reading"]);
    assert_eq!(aggregate.steps[0].examples.len(), 1);
    assert_eq!(aggregate.steps[0].routing_branches.len(), 1);
    assert_eq!(aggregate.steps[0].notes.len(), 1);
    assert_eq!(aggregate.tasks.len(), 1);
    assert_eq!(aggregate.tasks[0].steps.len(), 1);
    assert_eq!(aggregate.tasks[0].steps[0].id, step1.id);
}

#[tokio::test]
async fn deleting_a_workflow_cascades_to_children() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;
    let step = WorkflowStep::new(workflow.id.clone(), None, "s".to_string(), 1);
    stores.steps.save(&step).await.unwrap();
    stores
        .examples
        .save(&Example::new(
            step.id.clone(),
            "x".to_string(),
            None,
            ExampleLabel::Fail,
            None,
        ))
        .await
        .unwrap();

    stores.workflows.delete(&workflow.id).await.unwrap();

    assert!(stores.steps.get(&step.id).await.unwrap().is_none());
    assert!(stores
        .examples
        .list_by_step(&step.id, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn step_deletion_closes_the_order_gap() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;

    let mut ids = Vec::new();
    for order in 1..=4 {
        let step = WorkflowStep::new(
            workflow.id.clone(),
            None,
            format!("step-{}", order),
            order,
        );
        stores.steps.save(&step).await.unwrap();
        ids.push(step.id);
    }

    assert!(stores.steps.delete_and_renumber(&ids[1]).await.unwrap());

    let steps = stores.steps.list_by_workflow(&workflow.id).await.unwrap();
    let orders: Vec<i64> = steps.iter().map(|s| s.step_order).collect();
    let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(names, vec!["step-1", "step-3", "step-4"]);
}

#[tokio::test]
async fn order_conflicts_are_detected() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;
    let step = WorkflowStep::new(workflow.id.clone(), None, "s".to_string(), 1);
    stores.steps.save(&step).await.unwrap();

    assert!(stores
        .steps
        .order_exists(&workflow.id, 1, None)
        .await
        .unwrap());
    // The step itself is excluded when checking an update.
    assert!(!stores
        .steps
        .order_exists(&workflow.id, 1, Some(&step.id))
        .await
        .unwrap());
    assert!(!stores
        .steps
        .order_exists(&workflow.id, 2, None)
        .await
        .unwrap());
    assert_eq!(stores.steps.max_order(&workflow.id).await.unwrap(), 1);
}

#[tokio::test]
async fn tasks_reorder_and_cascade() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;

    let a = Task::new(workflow.id.clone(), "a".to_string(), 1, None);
    let b = Task::new(workflow.id.clone(), "b".to_string(), 2, None);
    let c = Task::new(workflow.id.clone(), "c".to_string(), 3, None);
    for task in [&a, &b, &c] {
        stores.tasks.save(task).await.unwrap();
    }
    assert_eq!(stores.tasks.next_order(&workflow.id).await.unwrap(), 4);

    stores
        .tasks
        .reorder(
            &workflow.id,
            vec![c.id.clone(), a.id.clone(), b.id.clone()],
        )
        .await
        .unwrap();

    let tasks = stores.tasks.list_by_workflow(&workflow.id).await.unwrap();
    let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b"]);

    let step = WorkflowStep::new(workflow.id.clone(), Some(a.id.clone()), "s".to_string(), 1);
    stores.steps.save(&step).await.unwrap();
    assert!(stores.tasks.delete(&a.id).await.unwrap());
    assert!(stores.steps.get(&step.id).await.unwrap().is_none());
}

#[tokio::test]
async fn examples_filter_by_label_in_insertion_order() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;
    let step = WorkflowStep::new(workflow.id.clone(), None, "s".to_string(), 1);
    stores.steps.save(&step).await.unwrap();

    let mut pass = Example::new(
        step.id.clone(),
        "good".to_string(),
        None,
        ExampleLabel::Pass,
        None,
    );
    // Force distinct created_at ordering.
    pass.created_at = pass.created_at - chrono::Duration::seconds(1);
    let fail = Example::new(
        step.id.clone(),
        "bad".to_string(),
        None,
        ExampleLabel::Fail,
        None,
    );
    stores.examples.save(&pass).await.unwrap();
    stores.examples.save(&fail).await.unwrap();

    let all = stores.examples.list_by_step(&step.id, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].content, "good");

    let failing = stores
        .examples
        .list_by_step(&step.id, Some(ExampleLabel::Fail))
        .await
        .unwrap();
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].content, "bad");
}

#[tokio::test]
async fn branch_removal_only_affects_the_given_step() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;
    let step = WorkflowStep::new(workflow.id.clone(), None, "s".to_string(), 1);
    stores.steps.save(&step).await.unwrap();

    let branch = RoutingBranch::new(
        step.id.clone(),
        "FAIL".to_string(),
        "retry".to_string(),
        "1".to_string(),
    );
    stores.steps.add_branch(&branch).await.unwrap();

    assert!(!stores
        .steps
        .remove_branch("other-step", &branch.id)
        .await
        .unwrap());
    assert!(stores
        .steps
        .remove_branch(&step.id, &branch.id)
        .await
        .unwrap());

    let loaded = stores
        .steps
        .get_with_children(&step.id)
        .await
        .unwrap()
        .unwrap();
    assert!(loaded.routing_branches.is_empty());
}

#[tokio::test]
async fn preset_templates_seed_once_and_clone() {
    let stores = stores();

    assert_eq!(stores.templates.init_presets().await.unwrap(), 3);
    assert_eq!(stores.templates.init_presets().await.unwrap(), 0);

    let templates = stores.templates.list().await.unwrap();
    assert_eq!(templates.len(), 3);
    assert!(templates.iter().all(|t| t.is_template));
    assert_eq!(templates[0].tasks.len(), 3);

    let template = stores
        .templates
        .get(&templates[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(template.tasks[0].steps.len(), 2);

    let new_id = stores
        .templates
        .create_workflow_from(&template.id, "My rounds", None)
        .await
        .unwrap()
        .unwrap();

    let clone = stores.workflows.get_aggregate(&new_id).await.unwrap().unwrap();
    assert_eq!(clone.name, "My rounds");
    assert_eq!(clone.status, WorkflowStatus::Draft);
    assert!(!clone.is_template);
    assert_eq!(clone.template_id.as_deref(), Some(template.id.as_str()));
    assert_eq!(clone.tasks.len(), 3);
    assert_eq!(clone.steps.len(), 6);
    let orders: Vec<i64> = clone.steps.iter().map(|s| s.step_order).collect();
    assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);

    // Cloning an unknown template reports not-found.
    assert!(stores
        .templates
        .create_workflow_from("missing", "x", None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn step_logic_fields_round_trip() {
    let stores = stores();
    let workflow = seed_workflow(&stores, "wf").await;

    let mut step = WorkflowStep::new(workflow.id.clone(), None, "judge".to_string(), 1);
    step.logic_strategy = Some(LogicStrategy::FewShot);
    step.logic_evaluation_prompt = Some("does it look right?".to_string());
    step.extraction_keywords = vec!["color".to_string(), "size".to_string()];
    step.routing_default_next = Some("step-2".to_string());
    stores.steps.save(&step).await.unwrap();

    let loaded = stores.steps.get(&step.id).await.unwrap().unwrap();
    assert_eq!(loaded.logic_strategy, Some(LogicStrategy::FewShot));
    assert_eq!(loaded.extraction_keywords, vec!["color", "size"]);
    assert_eq!(loaded.routing_default_next.as_deref(), Some("step-2"));
}

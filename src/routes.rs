// src/routes.rs

use actix_web::{web, HttpRequest};

use crate::collaborator::{
    attach_collaborator, create_collaborator, delete_collaborator, detach_collaborator,
    get_collaborator, list_collaborators, search_collaborators, update_collaborator,
};
use crate::error::ApiError;
use crate::project::{
    create_project, delete_project, get_project, list_projects, search_projects, update_project,
};
use crate::statistics::{
    count_projects, get_collaborators_per_task, get_tasks_per_collaborator, get_tasks_per_project,
};
use crate::task::{create_task, delete_task, get_task, list_tasks, update_task};

fn bad_request<E: std::fmt::Display>(err: E, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(err.to_string()).into()
}

/// Registers every endpoint. Malformed bodies, query strings and paths
/// answer 400 with the same JSON error shape as the handlers.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(bad_request))
        .app_data(web::QueryConfig::default().error_handler(bad_request))
        .app_data(web::PathConfig::default().error_handler(bad_request))
        // PROJECTS + nested TASKS
        .service(
            web::scope("/projects")
                .route("", web::get().to(list_projects))
                .route("", web::post().to(create_project))
                .route("/search", web::get().to(search_projects))
                .route("/{project_id}", web::get().to(get_project))
                .route("/{project_id}", web::put().to(update_project))
                .route("/{project_id}", web::delete().to(delete_project))
                .service(
                    web::scope("/{project_id}/tasks")
                        .route("", web::get().to(list_tasks))
                        .route("", web::post().to(create_task))
                        .route("/{task_id}", web::get().to(get_task))
                        .route("/{task_id}", web::put().to(update_task))
                        .route("/{task_id}", web::delete().to(delete_task)),
                ),
        )
        // COLLABORATORS
        .service(
            web::scope("/collaborators")
                .route("", web::get().to(list_collaborators))
                .route("", web::post().to(create_collaborator))
                .route("/search", web::get().to(search_collaborators))
                .route("/{collaborator_id}", web::get().to(get_collaborator))
                .route("/{collaborator_id}", web::put().to(update_collaborator))
                .route("/{collaborator_id}", web::delete().to(delete_collaborator))
                .route(
                    "/{collaborator_id}/projects/{project_id}/tasks/{task_id}",
                    web::post().to(attach_collaborator),
                )
                .route(
                    "/{collaborator_id}/projects/{project_id}/tasks/{task_id}",
                    web::delete().to(detach_collaborator),
                ),
        )
        // STATISTICS
        .service(
            web::scope("/statistics")
                .route("/projects/count", web::get().to(count_projects))
                .route("/tasks-per-project", web::get().to(get_tasks_per_project))
                .route(
                    "/collaborators-per-task",
                    web::get().to(get_collaborators_per_task),
                )
                .route(
                    "/tasks-per-collaborator",
                    web::get().to(get_tasks_per_collaborator),
                ),
        );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};

    use super::configure;
    use crate::app_state::AppState;
    use crate::models::{new_id, Collaborator, Project, Task};
    use crate::statistics::{CollaboratorsPerTask, ProjectCount, TasksPerProject};
    use crate::store::MemoryStore;

    fn state() -> web::Data<AppState> {
        web::Data::new(AppState::new(Arc::new(MemoryStore::new())))
    }

    macro_rules! app {
        () => {
            test::init_service(App::new().app_data(state()).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn project_lifecycle() {
        let app = app!();

        let req = test::TestRequest::post()
            .uri("/projects")
            .set_json(json!({ "name": "Website Redesign", "description": "new site" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Project = test::read_body_json(resp).await;

        let req = test::TestRequest::put()
            .uri(&format!("/projects/{}", created.id))
            .set_json(json!({ "status": "Doing" }))
            .to_request();
        let updated: Project = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated.description, "new site");
        assert_eq!(serde_json::to_value(updated.status).unwrap(), json!("Doing"));

        let req = test::TestRequest::get()
            .uri("/projects/search?name=redesign")
            .to_request();
        let found: Vec<Project> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found.len(), 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/projects/{}", created.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get()
            .uri(&format!("/projects/{}", created.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Project not found" }));
    }

    #[actix_web::test]
    async fn malformed_input_is_a_bad_request() {
        let app = app!();

        let req = test::TestRequest::get().uri("/projects/not-a-uuid").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/projects")
            .set_json(json!({ "description": "no name" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());

        let req = test::TestRequest::get()
            .uri("/statistics/tasks-per-project?min=-1")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/projects?limit=1000").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn tasks_and_attachment_over_http() {
        let app = app!();

        let req = test::TestRequest::post()
            .uri("/projects")
            .set_json(json!({
                "name": "Website Redesign",
                "tasks": [ { "name": "Design" } ]
            }))
            .to_request();
        let project: Project = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/projects/{}/tasks", project.id))
            .set_json(json!({ "name": "Build" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let build: Task = test::read_body_json(resp).await;

        let req = test::TestRequest::post()
            .uri("/collaborators")
            .set_json(json!({ "name": "Alice", "email": "alice@example.com", "function": "Dev" }))
            .to_request();
        let alice: Collaborator = test::call_and_read_body_json(&app, req).await;

        let attach_uri = format!(
            "/collaborators/{}/projects/{}/tasks/{}",
            alice.id, project.id, build.id
        );
        let req = test::TestRequest::post().uri(&attach_uri).to_request();
        let task: Task = test::call_and_read_body_json(&app, req).await;
        assert_eq!(task.collaborators, vec![alice.id.clone()]);

        let req = test::TestRequest::post().uri(&attach_uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!(
                "/collaborators/{}/projects/{}/tasks/{}",
                alice.id,
                project.id,
                new_id()
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Task not found" }));

        let req = test::TestRequest::get()
            .uri(&format!(
                "/statistics/collaborators-per-task?project_id={}&min=0",
                project.id
            ))
            .to_request();
        let rows: Vec<CollaboratorsPerTask> = test::call_and_read_body_json(&app, req).await;
        let rows: Vec<(&str, i64)> = rows
            .iter()
            .map(|r| (r.task_name.as_str(), r.total_collaborators))
            .collect();
        assert_eq!(rows, [("Build", 1), ("Design", 0)]);

        let req = test::TestRequest::get()
            .uri("/statistics/tasks-per-project")
            .to_request();
        let rows: Vec<TasksPerProject> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(rows[0].total_tasks, 2);

        let req = test::TestRequest::get()
            .uri("/statistics/tasks-per-collaborator?max=5")
            .to_request();
        let rows: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            rows,
            json!([{
                "collaborator_name": "Alice",
                "collaborator_email": "alice@example.com",
                "total_tasks": 1
            }])
        );

        let req = test::TestRequest::delete()
            .uri(&format!("/projects/{}/tasks/{}", project.id, build.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get()
            .uri(&format!("/projects/{}/tasks", project.id))
            .to_request();
        let tasks: Vec<Task> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Design");
    }

    #[actix_web::test]
    async fn task_listing_honours_sort_and_window() {
        let app = app!();

        let req = test::TestRequest::post()
            .uri("/projects")
            .set_json(json!({
                "name": "Website Redesign",
                "tasks": [ { "name": "a" }, { "name": "b" }, { "name": "c" } ]
            }))
            .to_request();
        let project: Project = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::get()
            .uri(&format!(
                "/projects/{}/tasks?skip=1&limit=1&sort=-name",
                project.id
            ))
            .to_request();
        let tasks: Vec<Task> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "b");

        let req = test::TestRequest::get()
            .uri(&format!("/projects/{}/tasks?sort=password", project.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn duplicate_collaborator_email_over_http() {
        let app = app!();
        let body = json!({ "name": "Alice", "email": "alice@example.com" });

        let req = test::TestRequest::post()
            .uri("/collaborators")
            .set_json(&body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/collaborators")
            .set_json(&body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/collaborators/search?query=ALICE")
            .to_request();
        let found: Vec<Collaborator> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found.len(), 1);

        let req = test::TestRequest::get()
            .uri("/statistics/projects/count")
            .to_request();
        let count: ProjectCount = test::call_and_read_body_json(&app, req).await;
        assert_eq!(count.total_projects, 0);
    }
}

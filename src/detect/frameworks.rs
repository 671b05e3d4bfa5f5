//! Builtin framework configurations.
//!
//! Each configuration is a plain `FrameworkConfig` value: the same shape
//! users write in detector YAML files.

use std::collections::BTreeMap;

use crate::detect::patterns::{
    ClassRoutePattern, DecoratorRoutePattern, FrameworkConfig, HandlerPattern,
    RegistrationCallPattern,
};

pub fn get_framework_config(name: &str) -> Option<FrameworkConfig> {
    match name.to_lowercase().as_str() {
        "flask" => Some(flask_config()),
        "fastapi" => Some(fastapi_config()),
        "django" => Some(django_config()),
        _ => None,
    }
}

fn route(decorator: &str, method_source: &str) -> DecoratorRoutePattern {
    DecoratorRoutePattern {
        decorator: decorator.to_string(),
        path_source: "arg[0]".to_string(),
        method_source: method_source.to_string(),
        default_method: "GET".to_string(),
    }
}

pub fn flask_config() -> FrameworkConfig {
    let mut responses = BTreeMap::new();
    responses.insert("werkzeug.exceptions.HTTPException".to_string(), "HTTP {code}".to_string());
    responses.insert("werkzeug.exceptions.BadRequest".to_string(), "HTTP 400".to_string());
    responses.insert("werkzeug.exceptions.Unauthorized".to_string(), "HTTP 401".to_string());
    responses.insert("werkzeug.exceptions.Forbidden".to_string(), "HTTP 403".to_string());
    responses.insert("werkzeug.exceptions.NotFound".to_string(), "HTTP 404".to_string());
    responses.insert(
        "werkzeug.exceptions.InternalServerError".to_string(),
        "HTTP 500".to_string(),
    );

    FrameworkConfig {
        name: "flask".to_string(),
        route_patterns: vec![
            route("route", "kwarg[methods]"),
            route("expose", "kwarg[methods]"),
        ],
        // Flask-RESTful resources come in through the registration call;
        // a class pattern as well would double-report them.
        class_patterns: Vec::new(),
        registration_patterns: vec![RegistrationCallPattern {
            call: "*.add_resource".to_string(),
            class_arg: 0,
            path_arg: 1,
            method_names: super::HTTP_METHOD_NAMES.iter().map(|m| m.to_string()).collect(),
        }],
        handler_patterns: vec![HandlerPattern {
            decorator: Some("errorhandler".to_string()),
            call: None,
        }],
        handled_exceptions: vec!["werkzeug.exceptions.HTTPException".to_string()],
        exception_responses: responses,
    }
}

pub fn fastapi_config() -> FrameworkConfig {
    let mut responses = BTreeMap::new();
    responses.insert("fastapi.HTTPException".to_string(), "HTTP {status_code}".to_string());
    responses.insert(
        "starlette.exceptions.HTTPException".to_string(),
        "HTTP {status_code}".to_string(),
    );
    responses.insert("pydantic.ValidationError".to_string(), "HTTP 422".to_string());
    responses.insert("RequestValidationError".to_string(), "HTTP 422".to_string());

    FrameworkConfig {
        name: "fastapi".to_string(),
        route_patterns: vec![
            route("get", "decorator_name"),
            route("post", "decorator_name"),
            route("put", "decorator_name"),
            route("delete", "decorator_name"),
            route("patch", "decorator_name"),
            route("options", "decorator_name"),
            route("head", "decorator_name"),
        ],
        class_patterns: Vec::new(),
        registration_patterns: Vec::new(),
        handler_patterns: vec![
            HandlerPattern {
                decorator: Some("exception_handler".to_string()),
                call: None,
            },
            HandlerPattern {
                decorator: None,
                call: Some("*.add_exception_handler".to_string()),
            },
        ],
        handled_exceptions: vec![
            "fastapi.HTTPException".to_string(),
            "starlette.exceptions.HTTPException".to_string(),
        ],
        exception_responses: responses,
    }
}

pub fn django_config() -> FrameworkConfig {
    let mut responses = BTreeMap::new();
    responses.insert(
        "rest_framework.exceptions.APIException".to_string(),
        "HTTP {status_code}".to_string(),
    );
    responses.insert("django.http.Http404".to_string(), "HTTP 404".to_string());

    FrameworkConfig {
        name: "django".to_string(),
        route_patterns: vec![DecoratorRoutePattern {
            decorator: "api_view".to_string(),
            path_source: "arg[0]".to_string(),
            method_source: "arg[0]".to_string(),
            default_method: "GET".to_string(),
        }],
        class_patterns: vec![ClassRoutePattern {
            base_classes: vec![
                "APIView".to_string(),
                "ViewSet".to_string(),
                "ModelViewSet".to_string(),
                "ReadOnlyModelViewSet".to_string(),
                "GenericAPIView".to_string(),
                "GenericViewSet".to_string(),
                "ListAPIView".to_string(),
                "CreateAPIView".to_string(),
                "RetrieveAPIView".to_string(),
                "UpdateAPIView".to_string(),
                "DestroyAPIView".to_string(),
                "ListCreateAPIView".to_string(),
                "RetrieveUpdateAPIView".to_string(),
                "RetrieveUpdateDestroyAPIView".to_string(),
                "View".to_string(),
                "TemplateView".to_string(),
                "FormView".to_string(),
                "DetailView".to_string(),
                "ListView".to_string(),
            ],
            method_names: super::HTTP_METHOD_NAMES.iter().map(|m| m.to_string()).collect(),
        }],
        registration_patterns: Vec::new(),
        handler_patterns: vec![HandlerPattern {
            decorator: Some("exception_handler".to_string()),
            call: None,
        }],
        handled_exceptions: vec!["rest_framework.exceptions.APIException".to_string()],
        exception_responses: responses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(get_framework_config("Flask").is_some());
        assert!(get_framework_config("FASTAPI").is_some());
        assert!(get_framework_config("rails").is_none());
    }

    #[test]
    fn configs_serialize_like_user_detector_files() {
        // Builtin configs and user YAML share one schema.
        let yaml = serde_yaml::to_string(&flask_config()).unwrap();
        let back: FrameworkConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.name, "flask");
        assert_eq!(back.route_patterns.len(), 2);
    }
}

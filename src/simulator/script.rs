//! Canned log output for simulated stages.

const CHECKOUT: &[&str] = &[
    "Cloning repository...",
    "Fetching origin refs",
    "Checking out branch main...",
    "HEAD is now at 3f2c9d1 Merge pull request #42",
];

const BUILD: &[&str] = &[
    "Building Docker image (python:3.10-slim)...",
    "Step 1/7 : FROM python:3.10-slim",
    "Step 2/7 : WORKDIR /app",
    "Step 3/7 : COPY requirements.txt .",
    "Step 4/7 : RUN pip install -r requirements.txt",
    "Step 5/7 : COPY . .",
    "Step 6/7 : EXPOSE 8080",
    "Step 7/7 : CMD [\"python\", \"app.py\"]",
    "Successfully tagged myorg/sample:latest",
    "Pushing image to registry (simulated)...",
];

const TEST: &[&str] = &[
    "Installing dependencies (pip install -r requirements.txt)...",
    "Running unit tests (pytest)...",
    "collected 48 items",
    "tests/test_api.py ........................",
    "tests/test_models.py ................",
    "tests/test_health.py ........",
];

const DEPLOY: &[&str] = &[
    "Deploying to Kubernetes (simulated kubectl apply)...",
    "deployment.apps/my-app configured",
    "service/my-app unchanged",
    "Waiting for deployment \"my-app\" rollout to finish: 1 of 3 updated replicas are available...",
    "Waiting for deployment \"my-app\" rollout to finish: 2 of 3 updated replicas are available...",
    "Verifying deployment...",
];

const WARNINGS: &[&str] = &[
    "WARNING: pip is configured with locations that require TLS/SSL",
    "DeprecationWarning: the imp module is deprecated in favour of importlib",
    "warning: image layer cache miss, rebuilding from scratch",
    "Retrying request to registry after transient 502",
    "Readiness check took longer than expected",
];

/// Lines a stage prints, opening line first.
pub(crate) fn lines_for(stage: &str) -> Option<&'static [&'static str]> {
    match stage.to_ascii_lowercase().as_str() {
        "checkout" | "clone" | "fetch" => Some(CHECKOUT),
        "build" | "docker" | "package" | "image" => Some(BUILD),
        "test" | "tests" | "unit-test" | "check" => Some(TEST),
        "deploy" | "release" | "rollout" => Some(DEPLOY),
        _ => None,
    }
}

/// The `index`-th line of a stage's output, cycling through its script.
pub(crate) fn line(stage: &str, index: usize) -> String {
    match lines_for(stage) {
        Some(lines) => lines[index % lines.len()].to_string(),
        None if index == 0 => format!("Starting {stage}..."),
        None => format!("[{stage}] step {index} done"),
    }
}

pub(crate) fn warning(index: usize) -> &'static str {
    WARNINGS[index % WARNINGS.len()]
}

pub(crate) fn warning_count() -> usize {
    WARNINGS.len()
}

pub(crate) fn success_line(stage: &str, seconds: u64) -> String {
    format!("Stage {stage} succeeded in {seconds}s")
}

pub(crate) fn failure_line(stage: &str) -> String {
    match stage.to_ascii_lowercase().as_str() {
        "checkout" | "clone" | "fetch" => {
            "fatal: unable to access repository: Could not resolve host: github.com".to_string()
        }
        "build" | "docker" | "package" | "image" => {
            "ERROR: failed to solve: process \"/bin/sh -c pip install -r requirements.txt\" did not complete successfully: exit code: 1".to_string()
        }
        "test" | "tests" | "unit-test" | "check" => {
            "FAILED tests/test_health.py::test_readiness - AssertionError: expected 200, got 503"
                .to_string()
        }
        "deploy" | "release" | "rollout" => {
            "error: deployment \"my-app\" exceeded its progress deadline".to_string()
        }
        _ => format!("Stage {stage} failed with exit code 1"),
    }
}

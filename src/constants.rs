//! Module defining constants used across the crate.

/// `apiVersion` written into every emitted kubeconfig.
pub const KUBECONFIG_API_VERSION: &str = "v1";

/// `kind` written into every emitted kubeconfig.
pub const KUBECONFIG_KIND: &str = "Config";

/// `apiVersion` of the TokenRequest resource.
pub const TOKEN_REQUEST_API_VERSION: &str = "authentication.k8s.io/v1";

/// `kind` of the TokenRequest resource.
pub const TOKEN_REQUEST_KIND: &str = "TokenRequest";

/// Name of the environment variable holding a list of kubeconfig paths.
///
/// Entries are separated by the platform path separator (`:` on Unix); the first entry
/// pointing at an existing file is used.
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Kubeconfig location relative to the user's home directory.
pub const DEFAULT_KUBECONFIG_RELATIVE_PATH: &str = ".kube/config";

/// Environment variable holding the API server host when running inside a pod.
pub const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Environment variable holding the API server port when running inside a pod.
pub const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";

/// Directory where the pod's service account credentials are mounted.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// File name of the mounted service account token.
pub const SERVICE_ACCOUNT_TOKEN_FILE: &str = "token";

/// File name of the mounted cluster CA bundle.
pub const SERVICE_ACCOUNT_CA_FILE: &str = "ca.crt";

/// Cluster label used for connections discovered from the in-cluster service account mount.
///
/// There is no kubeconfig to take a cluster name from in that case.
pub const IN_CLUSTER_LABEL: &str = "in-cluster";

/// Token lifetime requested when the caller does not pick one, in seconds.
pub const DEFAULT_EXPIRATION_SECONDS: i64 = 3600;

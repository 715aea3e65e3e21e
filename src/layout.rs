//! Version dependent locations inside a Symfony project.

use crate::version::Version;

/// Where things live in the target project for a given version and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Source root, mapped to the root namespace.
    pub root: String,
    pub namespace: String,
    /// `var/cache/<env>`
    pub cache: String,
    pub kernel_container_cache: String,
    pub front_controller: String,
    pub profiler_index: String,
}

impl Layout {
    pub fn new(version: &Version, environment: &str) -> Self {
        let env = if environment.is_empty() { "dev" } else { environment };
        let cache = format!("var/cache/{}", env);
        let camel = capitalize(env);

        let container = if *version >= Version::parse("5.0") {
            format!("App_Kernel{}DebugContainer.xml", camel)
        } else if *version >= Version::parse("4.2") {
            format!("srcApp_Kernel{}DebugContainer.xml", camel)
        } else if *version >= Version::parse("4.0") {
            format!("src{}DebugProjectContainer.xml", camel)
        } else {
            format!("app{}DebugProjectContainer.xml", camel)
        };

        let (namespace, front_controller) = if version.major() >= 4 {
            ("App", "public/index.php")
        } else {
            ("AppBundle", "web/app_dev.php")
        };

        Self {
            root: "src".to_string(),
            namespace: namespace.to_string(),
            kernel_container_cache: format!("{}/{}", cache, container),
            profiler_index: format!("{}/profiler/index.csv", cache),
            front_controller: front_controller.to_string(),
            cache,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

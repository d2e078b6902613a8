use flowrun_types::ToolVersion;

/// Build identifier injected at compile time, when the build sets one.
const BUILD_ID: Option<&str> = option_env!("FLOWRUN_BUILD_ID");
const BUILD_TIMESTAMP: Option<&str> = option_env!("FLOWRUN_BUILD_TIMESTAMP");

/// Version stamp of this build of flowrun.
pub fn current_tool_version() -> ToolVersion {
    ToolVersion::new(
        env!("CARGO_PKG_VERSION"),
        BUILD_ID.unwrap_or("dev"),
        BUILD_TIMESTAMP.unwrap_or("unknown"),
    )
}

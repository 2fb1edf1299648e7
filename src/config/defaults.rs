//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#false() -> bool {
    false
}

// ============================================================================
// config.json Defaults
// ============================================================================

pub mod build {
    pub mod tools {
        pub fn render() -> Vec<String> {
            vec!["pug".into()]
        }

        pub fn style() -> Vec<String> {
            vec!["sass".into()]
        }

        pub fn script() -> Vec<String> {
            vec!["esbuild".into()]
        }

        pub fn template_ext() -> String {
            "pug".into()
        }

        pub fn style_ext() -> String {
            "sass".into()
        }
    }
}

// ============================================================================
// config-ftp.json Defaults
// ============================================================================

pub mod deploy {
    pub fn local_folder() -> String {
        "dist".into()
    }

    pub fn base_path() -> String {
        "/".into()
    }
}

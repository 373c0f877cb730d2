//! Layout storage constants
//!
//! Folder names, file extensions, attribute keys and format versions shared by
//! every parser, so both storage layers agree on one on-disk shape.

/// Folder names directly below a layer root
pub mod folders {
    /// One `<name>.wsmode` file plus one `<name>/` member folder per mode
    pub const MODES: &str = "Modes";

    /// One `<name>.wsgrp` file plus one `<name>/` member folder per group
    pub const GROUPS: &str = "Groups";

    /// Flat store of serialized component instances
    pub const COMPONENTS: &str = "Components";
}

/// File extensions (without the dot)
pub mod ext {
    pub const MODE: &str = "wsmode";
    pub const TC_REF: &str = "wstcref";
    pub const GROUP: &str = "wsgrp";
    pub const TC_GROUP: &str = "wstcgrp";
    pub const WINDOW_MANAGER: &str = "wswmgr";
    pub const SETTINGS: &str = "settings";
}

/// Folder-node attribute keys
pub mod attrs {
    /// Explicit order record of a mode's component references
    pub const TC_REF_ORDER: &str = "WinSys-TCRef-Order";

    /// Separator between keys inside the order record
    pub const ORDER_SEPARATOR: char = '/';

    /// Per-child position hint used for the natural order of a module folder
    pub const POSITION: &str = "position";

    /// Side-channel file holding the attributes of one folder node
    pub const ATTRIBUTES_FILE: &str = ".nbattrs.json";
}

/// Format versions written on save
pub mod versions {
    pub const MODE: &str = "2.4";
    pub const TC_REF: &str = "2.2";
    pub const GROUP: &str = "2.0";
    pub const TC_GROUP: &str = "2.0";
    pub const WINDOW_MANAGER: &str = "2.1";

    /// Assumed when the root element carries no version
    pub const ASSUMED: &str = "2.0";

    /// First version whose child elements are understood
    pub const FIRST_SUPPORTED: &str = "2.0";
}

/// Identity key constants
pub mod identity {
    /// Used when a preferred key sanitizes to nothing
    pub const FALLBACK_KEY: &str = "Component";

    /// Separator placed before the collision counter (`key_1`, `key_2`, ...)
    pub const COLLISION_SEPARATOR: char = '_';
}

/// Window-manager defaults
pub mod window_manager {
    /// Root file name (`WindowManager.wswmgr`)
    pub const DEFAULT_NAME: &str = "WindowManager";

    /// Toolbar icon sizes the layout understands
    pub const SMALL_ICON_SIZE: i32 = 16;
    pub const LARGE_ICON_SIZE: i32 = 24;

    /// Split weight used when a path element carries none
    pub const DEFAULT_SPLIT_WEIGHT: f64 = 0.5;

    /// Frame state of a normal (not iconified/maximized) frame
    pub const FRAME_NORMAL: i32 = 0;
}

/// Runtime settings file location
pub mod config {
    /// Directory below the platform config dir
    pub const APP_DIR: &str = "winsys-layout";

    /// Settings file name
    pub const FILENAME: &str = "settings.json";

    /// Default module layer root (relative to the working directory)
    pub const DEFAULT_MODULE_ROOT: &str = "Windows2";

    /// Default local layer folder below `APP_DIR`
    pub const LOCAL_ROOT_DIR: &str = "Windows2Local";
}

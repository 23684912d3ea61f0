pub const SCHEMA: &str = r#"
-- Scan session tracking: one row per scanned source root
CREATE TABLE IF NOT EXISTS scan_sessions (
    id INTEGER PRIMARY KEY,
    source_root TEXT NOT NULL,
    source_drive_uuid TEXT NOT NULL,
    started_at_unix REAL NOT NULL,
    started_at INTEGER NOT NULL,
    completed_at_unix REAL,
    completed_at INTEGER,
    status TEXT NOT NULL,  -- 'running', 'completed', 'failed', 'interrupted'
    error_message TEXT,
    files_scanned INTEGER DEFAULT 0,
    directories_scanned INTEGER DEFAULT 0,
    total_bytes INTEGER DEFAULT 0,
    UNIQUE(source_root)
);

-- Directory completion tracking (resumability); root directory is ''
CREATE TABLE IF NOT EXISTS completed_directories (
    id INTEGER PRIMARY KEY,
    scan_session_id INTEGER NOT NULL REFERENCES scan_sessions(id) ON DELETE CASCADE,
    directory_path TEXT NOT NULL,
    file_count INTEGER NOT NULL,
    total_bytes INTEGER NOT NULL,
    completed_at_unix REAL NOT NULL,
    completed_at INTEGER NOT NULL,
    UNIQUE(scan_session_id, directory_path)
);

-- File inventory; all paths relative to scan_sessions.source_root
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    scan_session_id INTEGER NOT NULL REFERENCES scan_sessions(id) ON DELETE CASCADE,
    source_path TEXT NOT NULL,
    directory_path TEXT NOT NULL,
    filename_full TEXT NOT NULL,
    filename_base TEXT NOT NULL,
    extension TEXT,  -- lowercase, no dot, NULL when absent
    size INTEGER NOT NULL,
    fs_modified_at_unix REAL,
    fs_modified_at INTEGER,
    fs_changed_at_unix REAL,
    fs_changed_at INTEGER,
    fs_created_at_unix REAL,  -- birthtime where the platform has one
    fs_created_at INTEGER,
    fs_accessed_at_unix REAL,
    fs_accessed_at INTEGER,

    -- Stub columns for future stages (hashing, classification)
    hash_quick_start TEXT,
    hash_quick_end TEXT,
    hash_full TEXT,
    date_exif_original_unix REAL,
    date_exif_original INTEGER,
    date_exif_create_unix REAL,
    date_exif_create INTEGER,
    date_exif_modify_unix REAL,
    date_exif_modify INTEGER,
    file_type TEXT,
    exif_make TEXT,
    exif_model TEXT,
    metadata_json TEXT,

    -- Path-based date signals, each with the literal matched source text
    date_path_hierarchy INTEGER,
    date_path_hierarchy_source TEXT,
    date_path_folder INTEGER,
    date_path_folder_source TEXT,
    date_path_filename INTEGER,
    date_path_filename_source TEXT,
    path_dates_extracted_at_unix REAL,
    path_dates_extracted_at INTEGER,

    scanned_at_unix REAL NOT NULL,
    scanned_at INTEGER NOT NULL,
    metadata_extracted_at_unix REAL,
    metadata_extracted_at INTEGER,
    classified_at_unix REAL,
    classified_at INTEGER,
    UNIQUE(scan_session_id, source_path)
);

-- Indexes for scanner operations
CREATE INDEX IF NOT EXISTS idx_files_session ON files(scan_session_id);
CREATE INDEX IF NOT EXISTS idx_files_directory ON files(scan_session_id, directory_path);
CREATE INDEX IF NOT EXISTS idx_completed_dirs_session ON completed_directories(scan_session_id);

-- Indexes for later phases
CREATE INDEX IF NOT EXISTS idx_files_size ON files(size);
CREATE INDEX IF NOT EXISTS idx_files_extension ON files(extension) WHERE extension IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_files_hash_quick
    ON files(hash_quick_start) WHERE hash_quick_start IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_files_hash_full ON files(hash_full) WHERE hash_full IS NOT NULL;

-- Indexes for date resolution
CREATE INDEX IF NOT EXISTS idx_files_date_path_hierarchy
    ON files(date_path_hierarchy) WHERE date_path_hierarchy IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_files_date_path_folder
    ON files(date_path_folder) WHERE date_path_folder IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_files_date_path_filename
    ON files(date_path_filename) WHERE date_path_filename IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_files_no_path_date ON files(scan_session_id)
    WHERE date_path_hierarchy IS NULL
    AND date_path_folder IS NULL
    AND date_path_filename IS NULL;

-- Metadata extraction results, one-to-one with files
CREATE TABLE IF NOT EXISTS file_metadata (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL UNIQUE REFERENCES files(id) ON DELETE CASCADE,

    -- Normalized dates, paired as (fractional unix epoch, YYYYMMDD)
    date_original_unix REAL,
    date_original INTEGER,
    date_digitized_unix REAL,
    date_digitized INTEGER,
    date_modify_unix REAL,
    date_modify INTEGER,

    -- Camera/device info
    make TEXT,
    model TEXT,
    lens_model TEXT,

    -- Dimensions
    image_width INTEGER,
    image_height INTEGER,
    orientation INTEGER,

    -- Video-specific
    duration_seconds REAL,
    video_frame_rate REAL,

    -- GPS, signed decimal degrees
    gps_latitude REAL,
    gps_longitude REAL,
    gps_altitude REAL,

    -- Format info
    mime_type TEXT,
    metadata_families TEXT,  -- sorted, comma-joined group-0 prefixes

    -- Full dump (filtered, no binary data), keyed GROUP:TAG
    metadata_json TEXT,

    -- Extraction tracking; extraction_error and skip_reason are mutually exclusive
    extracted_at_unix REAL NOT NULL,
    extracted_at INTEGER NOT NULL,
    extractor_version TEXT,
    extraction_error TEXT,
    skip_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_file_metadata_file_id ON file_metadata(file_id);
CREATE INDEX IF NOT EXISTS idx_file_metadata_date_original
    ON file_metadata(date_original) WHERE date_original IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_file_metadata_make_model
    ON file_metadata(make, model) WHERE make IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_file_metadata_has_gps
    ON file_metadata(file_id) WHERE gps_latitude IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_file_metadata_errors
    ON file_metadata(file_id) WHERE extraction_error IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_file_metadata_skipped
    ON file_metadata(file_id) WHERE skip_reason IS NOT NULL;

-- Folder-level planning results
CREATE TABLE IF NOT EXISTS folder_plan (
    id INTEGER PRIMARY KEY,
    scan_session_id INTEGER NOT NULL REFERENCES scan_sessions(id) ON DELETE CASCADE,
    source_folder TEXT NOT NULL,

    -- Resolution result
    resolved_date INTEGER,        -- YYYYMMDD, NULL when bucketed
    resolved_date_source TEXT,    -- 'path_folder', 'metadata_prevalent',
                                  -- 'metadata_unanimous', 'inherited',
                                  -- 'low_coverage', 'wide_spread',
                                  -- 'no_consensus', 'no_images'
    target_folder TEXT NOT NULL,
    bucket TEXT,                  -- NULL, 'mixed_dates', 'non_media'
    annotation TEXT,

    -- File counts
    total_file_count INTEGER NOT NULL,
    image_file_count INTEGER NOT NULL,
    images_with_date_count INTEGER NOT NULL,

    -- Coverage metrics
    date_coverage_pct REAL,

    -- Date distribution over dated images
    prevalent_date INTEGER,
    prevalent_date_count INTEGER,
    prevalent_date_pct REAL,
    unique_date_count INTEGER,
    min_date INTEGER,
    max_date INTEGER,
    date_span_months INTEGER,

    -- Inheritance
    inherited_from_folder_id INTEGER REFERENCES folder_plan(id),
    is_subfolder BOOLEAN DEFAULT FALSE,

    -- Thresholds in force when this row was written
    config_min_coverage REAL,
    config_min_prevalence REAL,
    config_max_span_months INTEGER,

    planned_at_unix REAL NOT NULL,
    planned_at INTEGER NOT NULL,

    UNIQUE(scan_session_id, source_folder)
);

CREATE INDEX IF NOT EXISTS idx_folder_plan_session
    ON folder_plan(scan_session_id);
CREATE INDEX IF NOT EXISTS idx_folder_plan_bucket
    ON folder_plan(bucket) WHERE bucket IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_folder_plan_resolved_date
    ON folder_plan(resolved_date) WHERE resolved_date IS NOT NULL;

-- File-level planning results
CREATE TABLE IF NOT EXISTS file_plan (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL UNIQUE REFERENCES files(id) ON DELETE CASCADE,
    folder_plan_id INTEGER NOT NULL REFERENCES folder_plan(id) ON DELETE CASCADE,

    -- Denormalized source identity for easy querying
    source_path TEXT NOT NULL,
    source_filename TEXT NOT NULL,

    -- The file's own resolved date, before folder consensus
    file_resolved_date INTEGER,   -- YYYYMMDD
    file_date_source TEXT,        -- 'path_folder', 'path_filename',
                                  -- 'exif', 'fs_modified', 'none'

    -- Target
    target_folder TEXT NOT NULL,
    target_path TEXT NOT NULL,
    target_filename TEXT NOT NULL,  -- differs from source when renamed

    -- Flags
    is_potential_duplicate BOOLEAN DEFAULT FALSE,
    duplicate_source_hash TEXT,
    is_sidecar BOOLEAN DEFAULT FALSE,

    resolution_reason TEXT,

    planned_at_unix REAL NOT NULL,
    planned_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_file_plan_file_id ON file_plan(file_id);
CREATE INDEX IF NOT EXISTS idx_file_plan_folder_id ON file_plan(folder_plan_id);
CREATE INDEX IF NOT EXISTS idx_file_plan_target ON file_plan(target_path);
CREATE INDEX IF NOT EXISTS idx_file_plan_duplicates
    ON file_plan(file_id) WHERE is_potential_duplicate = TRUE;
CREATE INDEX IF NOT EXISTS idx_file_plan_sidecars
    ON file_plan(file_id) WHERE is_sidecar = TRUE;
"#;

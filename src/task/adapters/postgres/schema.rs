//! Diesel schema for task, task-run and result persistence.

diesel::table! {
    /// Task records.
    task (id) {
        /// Store-assigned task identifier.
        id -> Int8,
        /// Owning project.
        project_id -> Int8,
        /// Task payload.
        info -> Jsonb,
        /// SHA-256 of the canonical payload.
        #[max_length = 64]
        info_fingerprint -> Varchar,
        /// Scheduling priority in `[0, 1]`.
        priority_0 -> Float8,
        /// Redundancy target in `[1, 1000]`.
        n_answers -> Int4,
        /// Completion state.
        #[max_length = 20]
        state -> Varchar,
        /// Export snapshot flag.
        exported -> Bool,
        /// Creation timestamp.
        created -> Timestamptz,
    }
}

diesel::table! {
    /// Task runs submitted by contributors.
    task_run (id) {
        /// Store-assigned run identifier.
        id -> Int8,
        /// Owning project.
        project_id -> Int8,
        /// Answered task.
        task_id -> Int8,
        /// Registered contributor.
        user_id -> Nullable<Int8>,
        /// Anonymous contributor token.
        #[max_length = 255]
        anonymous_id -> Nullable<Varchar>,
        /// Answer payload.
        info -> Jsonb,
        /// Creation timestamp.
        created -> Timestamptz,
        /// Finish timestamp.
        finish_time -> Timestamptz,
    }
}

diesel::table! {
    /// Result rows; at most one current row per task.
    result (id) {
        /// Store-assigned result identifier.
        id -> Int8,
        /// Owning project.
        project_id -> Int8,
        /// Completed task.
        task_id -> Int8,
        /// Referenced run ids, ascending.
        task_run_ids -> Array<Int8>,
        /// Current-row flag.
        last_version -> Bool,
        /// Creation timestamp.
        created -> Timestamptz,
    }
}

diesel::joinable!(task_run -> task (task_id));
diesel::joinable!(result -> task (task_id));
diesel::allow_tables_to_appear_in_same_query!(task, task_run, result);

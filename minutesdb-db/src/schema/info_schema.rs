pub mod info {
    diesel::table! {
        info.ingestion_runs (id) {
            id -> Uuid,
            source_url -> Nullable<Text>,
            started_at -> Timestamptz,
            finished_at -> Nullable<Timestamptz>,
            status -> Text,
            records_processed -> Int4,
            records_failed -> Int4,
            duplicates_avoided -> Int4,
        }
    }

    diesel::table! {
        info.error_log (id) {
            id -> Uuid,
            timestamp -> Timestamptz,
            source_url -> Nullable<Text>,
            error_type -> Text,
            message -> Text,
            record_index -> Nullable<Int4>,
            ingestion_run_id -> Nullable<Uuid>,
        }
    }

    diesel::table! {
        info.alert_acknowledgments (alert_id) {
            alert_id -> Text,
            acknowledged_at -> Timestamptz,
            acknowledged_by -> Text,
        }
    }

    diesel::table! {
        info.error_log_view (id) {
            id -> Uuid,
            timestamp -> Timestamptz,
            source_url -> Nullable<Text>,
            error_type -> Text,
            message -> Text,
            record_index -> Nullable<Int4>,
            ingestion_run_id -> Nullable<Uuid>,
        }
    }

    diesel::table! {
        info.ingestion_run_view (id) {
            id -> Uuid,
            source_url -> Nullable<Text>,
            started_at -> Timestamptz,
            finished_at -> Nullable<Timestamptz>,
            status -> Text,
            records_processed -> Int4,
            records_failed -> Int4,
            duplicates_avoided -> Int4,
        }
    }

    diesel::table! {
        info.mv_ingestion_kpis (total_ingested) {
            total_ingested -> Int8,
            sources_count -> Int8,
            success_rate -> Float8,
            duplicates_avoided -> Int8,
            last_run_timestamp -> Nullable<Timestamptz>,
        }
    }

    diesel::table! {
        info.mv_ingestion_monthly (month) {
            month -> Date,
            records_ingested -> Int8,
            records_with_warnings -> Int8,
        }
    }
}

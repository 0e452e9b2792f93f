pub mod u501_import_olist_csv;

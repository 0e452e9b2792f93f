pub mod d400_seller_performance;

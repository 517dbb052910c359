pub mod yolo;
